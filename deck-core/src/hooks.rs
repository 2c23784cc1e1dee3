//! Feathers-style hooks.
//!
//! For every call the app collects global hooks first, then the
//! service's own hooks, and runs:
//!
//! ```text
//! around(outermost first) → before → service method → after (reverse) → done
//!                                    └─ on error: error hooks
//! ```
//!
//! Hooks receive a mutable [`HookContext`]; before hooks may rewrite
//! `data`/`params`, after hooks may rewrite `result`, error hooks may
//! inspect or clear `error`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::app::ServiceCaller;
use crate::context::RequestContext;
use crate::errors::DeckError;
use crate::{DeckConfigSnapshot, DeckService, ServiceMethodKind};

/// Result slot of a call: one record or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

pub struct HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub request: RequestContext,
    pub service: String,
    pub method: ServiceMethodKind,
    /// Record id for get/update/patch/remove.
    pub id: Option<String>,
    pub params: P,
    /// Input payload for create/update/patch.
    pub data: Option<R>,
    pub result: Option<HookResult<R>>,
    pub error: Option<anyhow::Error>,
    pub services: ServiceCaller<R, P>,
    pub config: DeckConfigSnapshot,
}

impl<R, P> HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(
        request: RequestContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        services: ServiceCaller<R, P>,
        config: DeckConfigSnapshot,
    ) -> Self {
        Self {
            request,
            service: service.into(),
            method,
            id: None,
            params,
            data: None,
            result: None,
            error: None,
            services,
            config,
        }
    }

    fn require_id(&self) -> Result<String> {
        self.id.clone().ok_or_else(|| {
            DeckError::bad_request(format!("{}() requires an id", self.method)).into_anyhow()
        })
    }

    fn take_data(&mut self) -> Result<R> {
        let method = self.method;
        self.data.take().ok_or_else(|| {
            DeckError::bad_request(format!("{method}() requires data")).into_anyhow()
        })
    }
}

#[async_trait]
pub trait DeckBeforeHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait DeckAfterHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Runs once `ctx.error` is set. Clearing `ctx.error` recovers the call.
#[async_trait]
pub trait DeckErrorHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Wraps everything inside it; call `next.run(ctx)` to continue.
#[async_trait]
pub trait DeckAroundHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>, next: Next<R, P>) -> Result<()>;
}

pub(crate) struct Pipeline<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub(crate) service: Arc<dyn DeckService<R, P>>,
    pub(crate) around: Vec<Arc<dyn DeckAroundHook<R, P>>>,
    pub(crate) before: Vec<Arc<dyn DeckBeforeHook<R, P>>>,
    pub(crate) after: Vec<Arc<dyn DeckAfterHook<R, P>>>,
}

impl<R, P> Pipeline<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run_inner(&self, ctx: &mut HookContext<R, P>) -> Result<()> {
        for h in &self.before {
            h.run(ctx).await?;
        }

        call_service(self.service.as_ref(), ctx).await?;

        for h in self.after.iter().rev() {
            h.run(ctx).await?;
        }

        Ok(())
    }
}

async fn call_service<R, P>(svc: &dyn DeckService<R, P>, ctx: &mut HookContext<R, P>) -> Result<()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    let request = ctx.request.clone();
    let params = ctx.params.clone();

    let result = match ctx.method {
        ServiceMethodKind::Find => HookResult::Many(svc.find(&request, params).await?),
        ServiceMethodKind::Get => {
            let id = ctx.require_id()?;
            HookResult::One(svc.get(&request, &id, params).await?)
        }
        ServiceMethodKind::Create => {
            let data = ctx.take_data()?;
            HookResult::One(svc.create(&request, data, params).await?)
        }
        ServiceMethodKind::Update => {
            let id = ctx.require_id()?;
            let data = ctx.take_data()?;
            HookResult::One(svc.update(&request, &id, data, params).await?)
        }
        ServiceMethodKind::Patch => {
            let id = ctx.require_id()?;
            let data = ctx.take_data()?;
            HookResult::One(svc.patch(&request, &id, data, params).await?)
        }
        ServiceMethodKind::Remove => {
            let id = ctx.require_id()?;
            HookResult::One(svc.remove(&request, &id, params).await?)
        }
    };

    ctx.result = Some(result);
    Ok(())
}

/// The rest of the pipeline as seen from an around hook.
pub struct Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pipeline: Arc<Pipeline<R, P>>,
    index: usize,
}

impl<R, P> Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub(crate) fn start(pipeline: Arc<Pipeline<R, P>>) -> Self {
        Self { pipeline, index: 0 }
    }

    pub async fn run(self, ctx: &mut HookContext<R, P>) -> Result<()> {
        match self.pipeline.around.get(self.index).cloned() {
            Some(hook) => {
                let next = Next {
                    pipeline: Arc::clone(&self.pipeline),
                    index: self.index + 1,
                };
                hook.run(ctx, next).await
            }
            None => self.pipeline.run_inner(ctx).await,
        }
    }
}

type ByMethod<T> = HashMap<ServiceMethodKind, Vec<Arc<T>>>;

/// Hook registrations for the whole app or one service.
pub struct ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub around_all: Vec<Arc<dyn DeckAroundHook<R, P>>>,
    pub before_all: Vec<Arc<dyn DeckBeforeHook<R, P>>>,
    pub after_all: Vec<Arc<dyn DeckAfterHook<R, P>>>,
    pub error_all: Vec<Arc<dyn DeckErrorHook<R, P>>>,

    pub around_by_method: ByMethod<dyn DeckAroundHook<R, P>>,
    pub before_by_method: ByMethod<dyn DeckBeforeHook<R, P>>,
    pub after_by_method: ByMethod<dyn DeckAfterHook<R, P>>,
    pub error_by_method: ByMethod<dyn DeckErrorHook<R, P>>,
}

impl<R, P> Default for ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            around_all: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            error_all: Vec::new(),
            around_by_method: HashMap::new(),
            before_by_method: HashMap::new(),
            after_by_method: HashMap::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn around_all(&mut self, hook: Arc<dyn DeckAroundHook<R, P>>) -> &mut Self {
        self.around_all.push(hook);
        self
    }

    pub fn before_all(&mut self, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn DeckAfterHook<R, P>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn DeckErrorHook<R, P>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn around(&mut self, method: ServiceMethodKind, hook: Arc<dyn DeckAroundHook<R, P>>) -> &mut Self {
        self.around_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: Arc<dyn DeckAfterHook<R, P>>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: Arc<dyn DeckErrorHook<R, P>>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before_create(&mut self, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Create, hook)
    }

    pub fn before_update(&mut self, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Update, hook)
    }

    pub fn before_patch(&mut self, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Patch, hook)
    }

    pub fn before_remove(&mut self, hook: Arc<dyn DeckBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Remove, hook)
    }

    pub fn after_find(&mut self, hook: Arc<dyn DeckAfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Find, hook)
    }

    pub fn after_get(&mut self, hook: Arc<dyn DeckAfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Get, hook)
    }
}

/// `all` hooks first, then the ones registered for `method`.
pub(crate) fn collect_method_hooks<T: ?Sized>(
    all: &[Arc<T>],
    by_method: &HashMap<ServiceMethodKind, Vec<Arc<T>>>,
    method: &ServiceMethodKind,
) -> Vec<Arc<T>> {
    let mut out: Vec<Arc<T>> = all.to_vec();
    if let Some(hooks) = by_method.get(method) {
        out.extend(hooks.iter().cloned());
    }
    out
}
