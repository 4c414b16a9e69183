//! Priority-ordered plugin list and hook dispatch.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::plugin::filters::FilterRegistry;
use crate::plugin::hook::{Hook, HookName, HookOutcome, PluginError, Stop};
use crate::plugin::traits::Plugin;

/// Active plugins, sorted by priority, with their flattened filters.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    filters: Arc<FilterRegistry>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut registry = Self::default();
        registry.configure(plugins);
        registry
    }

    /// Install a plugin list.
    ///
    /// Plugins are stably sorted by ascending priority. Returns `false`
    /// without rebuilding anything when the sorted list holds the same
    /// instances as the current one.
    pub fn configure(&mut self, plugins: Vec<Arc<dyn Plugin>>) -> bool {
        let mut sorted = plugins;
        sorted.sort_by_key(|plugin| plugin.priority());

        let unchanged = sorted.len() == self.plugins.len()
            && sorted
                .iter()
                .zip(&self.plugins)
                .all(|(a, b)| same_instance(a, b));
        if unchanged && !sorted.is_empty() {
            return false;
        }

        self.filters = Arc::new(FilterRegistry::from_plugins(&sorted));
        self.plugins = sorted;

        tracing::debug!(
            plugins = self.plugins.len(),
            filters = self.filters.len(),
            "configured plugins"
        );
        true
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn filters(&self) -> &Arc<FilterRegistry> {
        &self.filters
    }

    /// Plugins exposing `hook`, in dispatch order.
    pub fn exposing(&self, hook: HookName) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.hooks().contains(&hook))
    }

    /// Dispatch a hook to every plugin exposing it.
    ///
    /// `args` is threaded through each call so plugins may mutate it in
    /// place. The last claimed value is returned; `stop` decides whether
    /// the remaining plugins are still called. A plugin error aborts the
    /// dispatch.
    pub async fn run_hook<A, T, F>(
        &self,
        name: HookName,
        args: &mut A,
        stop: Stop<'_, T>,
        mut invoke: F,
    ) -> Result<Option<T>, PluginError>
    where
        A: ?Sized,
        F: for<'x> FnMut(Arc<dyn Plugin>, &'x mut A) -> BoxFuture<'x, HookOutcome<T>>,
    {
        let mut result = None;

        for plugin in self.exposing(name) {
            tracing::debug!(hook = %name, plugin = plugin.name(), "dispatching hook");

            let halted = match invoke(Arc::clone(plugin), &mut *args).await {
                Ok(Hook::Pass) => false,
                Ok(Hook::Claim(value)) => {
                    result = Some(value);
                    false
                }
                Ok(Hook::Halt(value)) => {
                    result = Some(value);
                    true
                }
                Err(err) => {
                    return Err(PluginError::Hook {
                        plugin: plugin.name().to_string(),
                        hook: name,
                        message: err.to_string(),
                    })
                }
            };

            if halted || stop.should_stop(result.as_ref()) {
                break;
            }
        }

        Ok(result)
    }

    /// Dispatch a hook and fall back to `fallback(args)` when nothing claims it.
    pub async fn run_hook_or<A, T, E, F, G>(
        &self,
        name: HookName,
        args: &mut A,
        stop: Stop<'_, T>,
        invoke: F,
        fallback: G,
    ) -> Result<T, E>
    where
        A: ?Sized,
        E: From<PluginError>,
        F: for<'x> FnMut(Arc<dyn Plugin>, &'x mut A) -> BoxFuture<'x, HookOutcome<T>>,
        G: for<'x> FnOnce(&'x mut A) -> BoxFuture<'x, Result<T, E>>,
    {
        match self.run_hook(name, args, stop, invoke).await? {
            Some(value) => Ok(value),
            None => fallback(args).await,
        }
    }
}

fn same_instance(a: &Arc<dyn Plugin>, b: &Arc<dyn Plugin>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::FutureExt;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Appends its name to a shared log and answers with a fixed hook result.
    struct Stub {
        name: &'static str,
        priority: i32,
        answer: Hook<String>,
        hooks: Vec<HookName>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stub {
        fn new(name: &'static str, priority: i32, answer: Hook<String>, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Plugin> {
            Arc::new(Self {
                name,
                priority,
                answer,
                hooks: vec![HookName::ViewCompile, HookName::RouteMount],
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl Plugin for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn hooks(&self) -> &[HookName] {
            &self.hooks
        }

        async fn route_mount(&self, routes: &mut Vec<sencha_routes::Route>) -> HookOutcome<()> {
            self.log.lock().push(self.name);
            routes.truncate(routes.len().saturating_sub(1));
            Ok(Hook::Pass)
        }
    }

    impl Stub {
        async fn answer(&self) -> HookOutcome<String> {
            self.log.lock().push(self.name);
            if self.name == "boom" {
                return Err(PluginError::failed("exploded"));
            }
            Ok(self.answer.clone())
        }
    }

    /// Dispatch through a concrete stub list, bypassing the trait object.
    async fn dispatch(stubs: &[Arc<Stub>], stop: Stop<'_, String>) -> Result<Option<String>, PluginError> {
        let plugins: Vec<Arc<dyn Plugin>> = stubs.iter().map(|p| Arc::clone(p) as Arc<dyn Plugin>).collect();
        let registry = PluginRegistry::new(plugins);
        let by_name = stubs.to_vec();
        let mut unit = ();

        registry
            .run_hook(HookName::ViewCompile, &mut unit, stop, |plugin, _| {
                let stub = by_name
                    .iter()
                    .find(|p| p.name == plugin.name())
                    .map(Arc::clone);
                async move {
                    match stub {
                        Some(stub) => stub.answer().await,
                        None => Ok(Hook::Pass),
                    }
                }
                .boxed()
            })
            .await
    }

    fn stub(name: &'static str, priority: i32, answer: Hook<String>, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Stub> {
        Arc::new(Stub {
            name,
            priority,
            answer,
            hooks: vec![HookName::ViewCompile],
            log: Arc::clone(log),
        })
    }

    fn claim(value: &str) -> Hook<String> {
        Hook::Claim(value.to_string())
    }

    #[tokio::test]
    async fn runs_in_priority_order_and_keeps_last_claim() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![
            stub("late", 10, claim("late"), &log),
            stub("early", -5, claim("early"), &log),
            stub("middle", 0, Hook::Pass, &log),
        ];

        let result = dispatch(&stubs, Stop::Never).await.unwrap();

        assert_eq!(result.as_deref(), Some("late"));
        assert_eq!(*log.lock(), vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn stops_at_first_claim() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![
            stub("a", 0, Hook::Pass, &log),
            stub("b", 1, claim("b"), &log),
            stub("c", 2, claim("c"), &log),
        ];

        let result = dispatch(&stubs, Stop::OnClaim).await.unwrap();

        assert_eq!(result.as_deref(), Some("b"));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn always_stops_after_first_exposing_plugin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![stub("a", 0, Hook::Pass, &log), stub("b", 1, claim("b"), &log)];

        let result = dispatch(&stubs, Stop::Always).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn halt_overrides_stop_policy() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![
            stub("a", 0, Hook::Halt("a".to_string()), &log),
            stub("b", 1, claim("b"), &log),
        ];

        let result = dispatch(&stubs, Stop::Never).await.unwrap();

        assert_eq!(result.as_deref(), Some("a"));
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn predicate_stop_checks_claimed_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![
            stub("short", 0, claim("x"), &log),
            stub("long", 1, claim("xxxx"), &log),
            stub("never", 2, claim("y"), &log),
        ];
        let long_enough = |value: &String| value.len() > 2;

        let result = dispatch(&stubs, Stop::When(&long_enough)).await.unwrap();

        assert_eq!(result.as_deref(), Some("xxxx"));
        assert_eq!(*log.lock(), vec!["short", "long"]);
    }

    #[tokio::test]
    async fn plugin_errors_name_the_plugin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stubs = vec![stub("boom", 0, Hook::Pass, &log), stub("after", 1, claim("x"), &log)];

        let err = dispatch(&stubs, Stop::Never).await.unwrap_err();

        assert_eq!(err.to_string(), "Plugin boom failed in viewCompile: exploded");
        assert_eq!(*log.lock(), vec!["boom"]);
    }

    #[tokio::test]
    async fn mutates_args_in_place_and_falls_back() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new(vec![
            Stub::new("a", 0, Hook::Pass, &log),
            Stub::new("b", 1, Hook::Pass, &log),
        ]);
        let route: sencha_routes::Route = serde_json::from_value(serde_json::json!({
            "url": "/", "file": "index.html", "slug": "/", "out": "dist/index.html",
            "view": "index", "lang": "en", "pretty_url": true
        }))
        .unwrap();
        let mut routes = vec![route.clone(), route.clone(), route];

        let value: Result<usize, PluginError> = registry
            .run_hook_or(
                HookName::RouteMount,
                &mut routes,
                Stop::Never,
                |plugin, routes| async move { plugin.route_mount(routes).await.map(|_| Hook::Pass) }.boxed(),
                |routes| async move { Ok(routes.len()) }.boxed(),
            )
            .await;

        assert_eq!(value.unwrap(), 1);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn configure_is_memoized_by_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Stub::new("a", 0, Hook::Pass, &log);
        let b = Stub::new("b", 1, Hook::Pass, &log);

        let mut registry = PluginRegistry::new(vec![Arc::clone(&b), Arc::clone(&a)]);
        assert_eq!(registry.plugins()[0].name(), "a");

        assert!(!registry.configure(vec![Arc::clone(&a), Arc::clone(&b)]));
        assert!(registry.configure(vec![Arc::clone(&a)]));
        assert_eq!(registry.plugins().len(), 1);
    }
}
