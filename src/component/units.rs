//! Ready-made units for the common cases

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{
    ButtonStyle, ComponentId, CompositeUnit, ContentBlock, ContentUnit, Control, ControlUnit, Unit,
};
use crate::builder::Builder;
use crate::remote::Interaction;
use crate::session::Session;
use crate::sync::lock;

/// Async callback run when a [`Button`] is pressed.
pub type InteractHandler =
    Arc<dyn Fn(Arc<Session>, Interaction) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Content unit backed by a closure.
pub struct FnContent<F> {
    id: ComponentId,
    render: F,
}

impl<F> FnContent<F>
where
    F: Fn(&mut ContentBlock) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(id: impl Into<ComponentId>, render: F) -> Self {
        Self {
            id: id.into(),
            render,
        }
    }
}

impl<F> Unit for FnContent<F>
where
    F: Fn(&mut ContentBlock) -> anyhow::Result<()> + Send + Sync,
{
    fn id(&self) -> &ComponentId {
        &self.id
    }
}

impl<F> ContentUnit for FnContent<F>
where
    F: Fn(&mut ContentBlock) -> anyhow::Result<()> + Send + Sync,
{
    fn render(&self, block: &mut ContentBlock) -> anyhow::Result<()> {
        (self.render)(block)
    }
}

/// Composite unit backed by a closure.
pub struct FnComposite<F> {
    id: ComponentId,
    load: F,
}

impl<F> FnComposite<F>
where
    F: Fn(&Builder) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(id: impl Into<ComponentId>, load: F) -> Self {
        Self { id: id.into(), load }
    }
}

impl<F> Unit for FnComposite<F>
where
    F: Fn(&Builder) -> anyhow::Result<()> + Send + Sync,
{
    fn id(&self) -> &ComponentId {
        &self.id
    }
}

impl<F> CompositeUnit for FnComposite<F>
where
    F: Fn(&Builder) -> anyhow::Result<()> + Send + Sync,
{
    fn on_load(&self, builder: &Builder) -> anyhow::Result<()> {
        (self.load)(builder)
    }
}

#[derive(Debug, Clone)]
struct ButtonState {
    label: String,
    style: ButtonStyle,
    emoji: Option<String>,
    disabled: bool,
}

/// Clickable button. Label, style and disabled flag can change between
/// renders; the next update picks the change up.
pub struct Button {
    id: ComponentId,
    state: Mutex<ButtonState>,
    handler: Option<InteractHandler>,
}

impl Button {
    pub fn new(id: impl Into<ComponentId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(ButtonState {
                label: label.into(),
                style: ButtonStyle::default(),
                emoji: None,
                disabled: false,
            }),
            handler: None,
        }
    }

    pub fn style(self, style: ButtonStyle) -> Self {
        lock(&self.state).style = style;
        self
    }

    pub fn emoji(self, emoji: impl Into<String>) -> Self {
        lock(&self.state).emoji = Some(emoji.into());
        self
    }

    /// Run `handler` on press instead of the default re-render.
    pub fn on_press<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<Session>, Interaction) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: InteractHandler = Arc::new(
            move |session: Arc<Session>, interaction: Interaction| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(handler(session, interaction))
            },
        );
        self.handler = Some(handler);
        self
    }

    pub fn set_label(&self, label: impl Into<String>) {
        lock(&self.state).label = label.into();
    }

    pub fn set_style(&self, style: ButtonStyle) {
        lock(&self.state).style = style;
    }

    pub fn set_disabled(&self, disabled: bool) {
        lock(&self.state).disabled = disabled;
    }
}

impl Unit for Button {
    fn id(&self) -> &ComponentId {
        &self.id
    }
}

#[async_trait]
impl ControlUnit for Button {
    fn render(&self) -> anyhow::Result<Control> {
        let state = lock(&self.state).clone();
        Ok(Control::Button {
            custom_id: self.id.clone(),
            label: state.label,
            style: state.style,
            emoji: state.emoji,
            disabled: state.disabled,
        })
    }

    async fn on_interact(&self, session: Arc<Session>, interaction: Interaction) -> anyhow::Result<()> {
        match &self.handler {
            Some(handler) => handler(session, interaction).await,
            None => {
                session.render_interaction(&interaction).await?;
                Ok(())
            }
        }
    }
}
