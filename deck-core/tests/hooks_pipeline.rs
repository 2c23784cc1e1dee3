use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use deck_core::errors::{DeckError, ErrorKind};
use deck_core::schema::SchemaHooksExt;
use deck_core::{
    DeckAfterHook, DeckApp, DeckAroundHook, DeckBeforeHook, DeckErrorHook, DeckService, HookContext,
    HookResult, Next, RequestContext, ServiceCapabilities, ServiceMethodKind,
};

type Trace = Arc<Mutex<Vec<String>>>;

/// Echoes data back, appending "+svc".
struct EchoService {
    trace: Trace,
}

#[async_trait]
impl DeckService<String, ()> for EchoService {
    fn capabilities(&self) -> ServiceCapabilities {
        use ServiceMethodKind::*;
        ServiceCapabilities::from_methods(vec![Find, Get, Create])
    }

    async fn find(&self, _ctx: &RequestContext, _params: ()) -> Result<Vec<String>> {
        Ok(vec!["a".into(), "b".into()])
    }

    async fn get(&self, _ctx: &RequestContext, id: &str, _params: ()) -> Result<String> {
        if id == "missing" {
            return Err(DeckError::not_found(format!("No record found for id '{id}'")).into_anyhow());
        }
        Ok(id.to_string())
    }

    async fn create(&self, _ctx: &RequestContext, data: String, _params: ()) -> Result<String> {
        self.trace.lock().unwrap().push("service".into());
        Ok(format!("{data}+svc"))
    }
}

struct Mark {
    label: &'static str,
    trace: Trace,
}

#[async_trait]
impl DeckBeforeHook<String, ()> for Mark {
    async fn run(&self, _ctx: &mut HookContext<String, ()>) -> Result<()> {
        self.trace.lock().unwrap().push(self.label.into());
        Ok(())
    }
}

#[async_trait]
impl DeckAfterHook<String, ()> for Mark {
    async fn run(&self, _ctx: &mut HookContext<String, ()>) -> Result<()> {
        self.trace.lock().unwrap().push(self.label.into());
        Ok(())
    }
}

#[async_trait]
impl DeckAroundHook<String, ()> for Mark {
    async fn run(&self, ctx: &mut HookContext<String, ()>, next: Next<String, ()>) -> Result<()> {
        self.trace.lock().unwrap().push(format!("{}:in", self.label));
        let res = next.run(ctx).await;
        self.trace.lock().unwrap().push(format!("{}:out", self.label));
        res
    }
}

struct UppercaseResult;

#[async_trait]
impl DeckAfterHook<String, ()> for UppercaseResult {
    async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
        if let Some(HookResult::One(v)) = ctx.result.as_mut() {
            *v = v.to_uppercase();
        }
        Ok(())
    }
}

struct RecoverNotFound;

#[async_trait]
impl DeckErrorHook<String, ()> for RecoverNotFound {
    async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
        let not_found = ctx
            .error
            .as_ref()
            .and_then(DeckError::from_anyhow)
            .is_some_and(|e| e.kind == ErrorKind::NotFound);

        if not_found {
            ctx.error = None;
            ctx.result = Some(HookResult::One("fallback".into()));
        }
        Ok(())
    }
}

fn app_with_echo(trace: &Trace) -> DeckApp<String, ()> {
    let app: DeckApp<String, ()> = DeckApp::new();
    app.register_service("echo", Arc::new(EchoService { trace: trace.clone() }));
    app
}

#[tokio::test]
async fn hooks_run_in_feathers_order() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let t = trace.clone();
    app.hooks(move |h| {
        h.around_all(Arc::new(Mark { label: "around-global", trace: t.clone() }));
        h.before_all(Arc::new(Mark { label: "before-global", trace: t.clone() }));
        h.after_all(Arc::new(Mark { label: "after-global", trace: t.clone() }));
    });

    let t = trace.clone();
    let echo = app.service("echo").unwrap().hooks(move |h| {
        h.around(ServiceMethodKind::Create, Arc::new(Mark { label: "around-svc", trace: t.clone() }));
        h.before_create(Arc::new(Mark { label: "before-svc", trace: t.clone() }));
        h.after(ServiceMethodKind::Create, Arc::new(Mark { label: "after-svc", trace: t.clone() }));
    });

    let out = echo
        .create(RequestContext::internal(), "card".into(), ())
        .await
        .unwrap();
    assert_eq!(out, "card+svc");

    let seen = trace.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "around-global:in",
            "around-svc:in",
            "before-global",
            "before-svc",
            "service",
            "after-svc",
            "after-global",
            "around-svc:out",
            "around-global:out",
        ]
    );
}

#[tokio::test]
async fn method_hooks_do_not_leak_to_other_methods() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let t = trace.clone();
    let echo = app.service("echo").unwrap().hooks(move |h| {
        h.before_create(Arc::new(Mark { label: "before-create", trace: t.clone() }));
    });

    let all = echo.find(RequestContext::internal(), ()).await.unwrap();
    assert_eq!(all, vec!["a".to_string(), "b".to_string()]);
    assert!(trace.lock().unwrap().is_empty());
}

#[tokio::test]
async fn after_hooks_can_rewrite_result() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let echo = app.service("echo").unwrap().hooks(|h| {
        h.after_get(Arc::new(UppercaseResult));
    });

    let got = echo.get(RequestContext::internal(), "pikachu", ()).await.unwrap();
    assert_eq!(got, "PIKACHU");
}

#[tokio::test]
async fn error_hooks_see_the_error_and_may_recover() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let echo = app.service("echo").unwrap();
    let err = echo
        .get(RequestContext::internal(), "missing", ())
        .await
        .unwrap_err();
    assert_eq!(DeckError::from_anyhow(&err).unwrap().code(), 404);

    let echo = echo.hooks(|h| {
        h.error_all(Arc::new(RecoverNotFound));
    });
    let got = echo.get(RequestContext::internal(), "missing", ()).await.unwrap();
    assert_eq!(got, "fallback");
}

#[tokio::test]
async fn methods_outside_capabilities_are_method_not_allowed() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let err = app
        .service("echo")
        .unwrap()
        .remove(RequestContext::internal(), "x", ())
        .await
        .unwrap_err();

    let deck = DeckError::from_anyhow(&err).unwrap();
    assert_eq!(deck.kind, ErrorKind::MethodNotAllowed);
    assert_eq!(deck.code(), 405);
}

#[tokio::test]
async fn schema_resolve_runs_before_validate() {
    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);

    let echo = app.service("echo").unwrap().hooks(|h| {
        h.schema(|s| {
            s.on_create()
                .resolve(|data: &mut String, _meta| {
                    *data = data.trim().to_string();
                    Ok(())
                })
                .validate(|data: &String, _meta| {
                    if data.is_empty() {
                        return Err(DeckError::bad_request("name is required").into_anyhow());
                    }
                    Ok(())
                });
        });
    });

    let ok = echo
        .create(RequestContext::internal(), "  squirtle ".into(), ())
        .await
        .unwrap();
    assert_eq!(ok, "squirtle+svc");

    let err = echo
        .create(RequestContext::internal(), "   ".into(), ())
        .await
        .unwrap_err();
    assert_eq!(DeckError::from_anyhow(&err).unwrap().kind, ErrorKind::BadRequest);
    assert_eq!(trace.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn config_snapshot_is_visible_to_hooks() {
    struct RequireFlag;

    #[async_trait]
    impl DeckBeforeHook<String, ()> for RequireFlag {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            if ctx.config.get_bool("echo.enabled") != Some(true) {
                return Err(DeckError::unavailable("echo disabled").into_anyhow());
            }
            Ok(())
        }
    }

    let trace: Trace = Arc::default();
    let app = app_with_echo(&trace);
    let echo = app.service("echo").unwrap().hooks(|h| {
        h.before_all(Arc::new(RequireFlag));
    });

    assert!(echo.find(RequestContext::internal(), ()).await.is_err());

    app.set("echo.enabled", "true");
    assert!(echo.find(RequestContext::internal(), ()).await.is_ok());
}
