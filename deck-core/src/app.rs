use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;

use crate::errors::DeckError;
use crate::hooks::{collect_method_hooks, Pipeline};
use crate::{
    DeckAfterHook, DeckAroundHook, DeckBeforeHook, DeckConfig, DeckConfigSnapshot, DeckErrorHook,
    DeckService, HookContext, HookResult, Next, RequestContext, ServiceHooks,
    ServiceMethodKind,
};

struct DeckAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    services: RwLock<HashMap<String, Arc<dyn DeckService<R, P>>>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<DeckConfig>,
    // Arc<dyn DeckService<R, P>> behind Any, for ServiceCaller lookups
    any_services: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Central application container.
///
/// Transport-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
pub struct DeckApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<DeckAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn DeckAroundHook<R, P>>>,
    Vec<Arc<dyn DeckBeforeHook<R, P>>>,
    Vec<Arc<dyn DeckAfterHook<R, P>>>,
    Vec<Arc<dyn DeckErrorHook<R, P>>>,
);

impl<R, P> Default for DeckApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for DeckApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> DeckApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DeckAppInner {
                services: RwLock::new(HashMap::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(DeckConfig::new()),
                any_services: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn DeckService<R, P>>)
    where
        S: Into<String>,
    {
        let name = name.into();

        write(&self.inner.services).insert(name.clone(), Arc::clone(&service));
        write(&self.inner.any_services).insert(name, Box::new(service));
    }

    /// Feathers: `app.hooks({ ... })`
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = write(&self.inner.global_hooks);
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = write(&self.inner.service_hooks);
        f(map.entry(service_name.to_string()).or_default());
    }

    /// Feathers: `app.service("name")`
    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = read(&self.inner.services)
            .get(name)
            .cloned()
            .ok_or_else(|| DeckError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    /// Feathers: `app.set(key, value)`
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        write(&self.inner.config).set(key, value);
    }

    /// Feathers: `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        read(&self.inner.config).get(key).map(str::to_string)
    }

    pub fn config_snapshot(&self) -> DeckConfigSnapshot {
        read(&self.inner.config).snapshot()
    }
}

pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: DeckApp<R, P>,
    name: String,
    service: Arc<dyn DeckService<R, P>>,
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// Feathers: `app.service("x").hooks({ ... })`
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global hooks first, then the service's.
    fn collect_hooks_for_method(&self, method: &ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = read(&self.app.inner.global_hooks);
        let map = read(&self.app.inner.service_hooks);

        let mut around = collect_method_hooks(&g.around_all, &g.around_by_method, method);
        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            around.extend(collect_method_hooks(&h.around_all, &h.around_by_method, method));
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (around, before, after, error)
    }

    fn new_context(&self, request: RequestContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(
            request,
            self.name.clone(),
            method,
            params,
            ServiceCaller::new(self.app.clone()),
            self.app.config_snapshot(),
        )
    }

    /// around → before → service call → after, then error hooks on failure.
    async fn run_pipeline(&self, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        let method = ctx.method;

        if !self.service.capabilities().allows(&method) {
            return Err(DeckError::method_not_allowed(format!(
                "Method '{method}' is not allowed on service '{}'",
                self.name
            ))
            .into_anyhow());
        }

        let (around, before, after, error) = self.collect_hooks_for_method(&method);

        let pipeline = Arc::new(Pipeline {
            service: Arc::clone(&self.service),
            around,
            before,
            after,
        });

        if let Err(e) = Next::start(pipeline).run(&mut ctx).await {
            ctx.error = Some(e);

            for h in &error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    ctx.error = Some(hook_err);
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    fn expect_one(method: ServiceMethodKind, result: Option<HookResult<R>>) -> Result<R> {
        match result {
            Some(HookResult::One(v)) => Ok(v),
            Some(HookResult::Many(_)) => Err(DeckError::general_error(format!(
                "{method}() produced a list unexpectedly"
            ))
            .into_anyhow()),
            None => Err(DeckError::general_error(format!("{method}() produced no result")).into_anyhow()),
        }
    }

    pub async fn find(&self, request: RequestContext, params: P) -> Result<Vec<R>> {
        let ctx = self.new_context(request, ServiceMethodKind::Find, params);
        let ctx = self.run_pipeline(ctx).await?;

        match ctx.result {
            Some(HookResult::Many(v)) => Ok(v),
            Some(HookResult::One(v)) => Ok(vec![v]),
            None => Ok(vec![]),
        }
    }

    pub async fn get(&self, request: RequestContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.new_context(request, ServiceMethodKind::Get, params);
        ctx.id = Some(id.to_string());

        let ctx = self.run_pipeline(ctx).await?;
        Self::expect_one(ServiceMethodKind::Get, ctx.result)
    }

    pub async fn create(&self, request: RequestContext, data: R, params: P) -> Result<R> {
        let mut ctx = self.new_context(request, ServiceMethodKind::Create, params);
        ctx.data = Some(data);

        let ctx = self.run_pipeline(ctx).await?;
        Self::expect_one(ServiceMethodKind::Create, ctx.result)
    }

    pub async fn update(&self, request: RequestContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.new_context(request, ServiceMethodKind::Update, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);

        let ctx = self.run_pipeline(ctx).await?;
        Self::expect_one(ServiceMethodKind::Update, ctx.result)
    }

    pub async fn patch(&self, request: RequestContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.new_context(request, ServiceMethodKind::Patch, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);

        let ctx = self.run_pipeline(ctx).await?;
        Self::expect_one(ServiceMethodKind::Patch, ctx.result)
    }

    pub async fn remove(&self, request: RequestContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.new_context(request, ServiceMethodKind::Remove, params);
        ctx.id = Some(id.to_string());

        let ctx = self.run_pipeline(ctx).await?;
        Self::expect_one(ServiceMethodKind::Remove, ctx.result)
    }
}

/// Lets hooks reach other registered services directly, without
/// running their hooks.
pub struct ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: DeckApp<R, P>,
}

impl<R, P> Clone for ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
        }
    }
}

impl<R, P> ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(app: DeckApp<R, P>) -> Self {
        Self { app }
    }

    pub fn service<R2, P2>(&self, name: &str) -> Result<Arc<dyn DeckService<R2, P2>>>
    where
        R2: Send + 'static,
        P2: Send + 'static,
    {
        let map = read(&self.app.inner.any_services);

        let any = map
            .get(name)
            .ok_or_else(|| DeckError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        let stored = any
            .as_ref()
            .downcast_ref::<Arc<dyn DeckService<R2, P2>>>()
            .ok_or_else(|| {
                DeckError::general_error(format!(
                    "Service type mismatch for '{name}': requested a different <R, P> than registered"
                ))
                .into_anyhow()
            })?;

        Ok(stored.clone())
    }
}
