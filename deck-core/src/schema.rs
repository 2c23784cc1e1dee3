//! # Schema hooks
//!
//! A [`SchemaHook`] either resolves `ctx.data` (rewrites it: defaults,
//! coercion) or validates it (rejects it) before a write. Callbacks get a
//! [`HookMeta`], an owned view of the rest of the context, so they can
//! read `params`/`config` while holding `&mut ctx.data`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::DeckError;
use crate::{
    DeckBeforeHook, DeckConfigSnapshot, HookContext, RequestContext, ServiceCaller, ServiceHooks,
    ServiceMethodKind,
};

/// Write methods a schema hook applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethods {
    Create,
    Patch,
    Update,
    /// create and update: payloads that must be complete
    Replace,
    AllWrites,
}

impl WriteMethods {
    pub fn matches(&self, method: &ServiceMethodKind) -> bool {
        use ServiceMethodKind as M;
        match self {
            WriteMethods::Create => matches!(method, M::Create),
            WriteMethods::Patch => matches!(method, M::Patch),
            WriteMethods::Update => matches!(method, M::Update),
            WriteMethods::Replace => matches!(method, M::Create | M::Update),
            WriteMethods::AllWrites => matches!(method, M::Create | M::Update | M::Patch),
        }
    }
}

#[derive(Clone)]
pub struct HookMeta<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub request: RequestContext,
    pub service: String,
    pub method: ServiceMethodKind,
    pub id: Option<String>,
    pub params: P,
    pub services: ServiceCaller<R, P>,
    pub config: DeckConfigSnapshot,
}

impl<R, P> HookMeta<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn from_ctx(ctx: &HookContext<R, P>) -> Self {
        Self {
            request: ctx.request.clone(),
            service: ctx.service.clone(),
            method: ctx.method,
            id: ctx.id.clone(),
            params: ctx.params.clone(),
            services: ctx.services.clone(),
            config: ctx.config.clone(),
        }
    }
}

pub type ValidateFn<R, P> = Arc<dyn Fn(&R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static>;

pub type ResolveFn<R, P> = Arc<dyn Fn(&mut R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static>;

fn missing_data(method: ServiceMethodKind) -> anyhow::Error {
    DeckError::bad_request(format!("{method}() requires a request body")).into_anyhow()
}

enum Step<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    Resolve(ResolveFn<R, P>),
    Validate(ValidateFn<R, P>),
}

/// One resolve or validate step, limited to some write methods.
pub struct SchemaHook<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    methods: WriteMethods,
    step: Step<R, P>,
}

impl<R, P> SchemaHook<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn resolve(
        methods: WriteMethods,
        f: impl Fn(&mut R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            methods,
            step: Step::Resolve(Arc::new(f)),
        }
    }

    pub fn validate(
        methods: WriteMethods,
        f: impl Fn(&R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            methods,
            step: Step::Validate(Arc::new(f)),
        }
    }
}

#[async_trait]
impl<R, P> DeckBeforeHook<R, P> for SchemaHook<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()> {
        let method = ctx.method;
        if !self.methods.matches(&method) {
            return Ok(());
        }

        let meta = HookMeta::from_ctx(ctx);
        match &self.step {
            Step::Resolve(f) => f(ctx.data.as_mut().ok_or_else(|| missing_data(method))?, &meta),
            Step::Validate(f) => f(ctx.data.as_ref().ok_or_else(|| missing_data(method))?, &meta),
        }
    }
}

/// Fluent builder behind [`SchemaHooksExt::schema`]. Hooks are appended
/// to the service's before chain in the order they are declared.
pub struct SchemaBuilder<'a, R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    hooks: &'a mut ServiceHooks<R, P>,
    current_methods: WriteMethods,
}

impl<'a, R, P> SchemaBuilder<'a, R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn new(hooks: &'a mut ServiceHooks<R, P>) -> Self {
        Self {
            hooks,
            current_methods: WriteMethods::AllWrites,
        }
    }

    pub fn on_create(&mut self) -> &mut Self {
        self.current_methods = WriteMethods::Create;
        self
    }

    pub fn on_replace(&mut self) -> &mut Self {
        self.current_methods = WriteMethods::Replace;
        self
    }

    pub fn on_writes(&mut self) -> &mut Self {
        self.current_methods = WriteMethods::AllWrites;
        self
    }

    pub fn resolve(
        &mut self,
        f: impl Fn(&mut R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks
            .before_all(Arc::new(SchemaHook::resolve(self.current_methods, f)));
        self
    }

    pub fn validate(
        &mut self,
        f: impl Fn(&R, &HookMeta<R, P>) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks
            .before_all(Arc::new(SchemaHook::validate(self.current_methods, f)));
        self
    }
}

/// `hooks.schema(|s| { s.on_create().resolve(..).validate(..); })`
pub trait SchemaHooksExt<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn schema<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut SchemaBuilder<'_, R, P>);
}

impl<R, P> SchemaHooksExt<R, P> for ServiceHooks<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn schema<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut SchemaBuilder<'_, R, P>),
    {
        let mut b = SchemaBuilder::new(self);
        f(&mut b);
        self
    }
}
