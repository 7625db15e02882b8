//! FlowUiService - renders flows and translates clicks into bus events

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use eyre::Context;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::dom::{Document, Node};
use super::model::{Flow, FlowStep, StepStatus};
use crate::config::UiConfig;
use crate::events::{EventBus, Subscription, topics};
use crate::logging::{Level, SharedLogger};

/// Synchronous yes/no prompt shown before destructive actions
pub type ConfirmFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// CSS classes the renderer emits and the click handler matches on
pub mod classes {
    pub const EMPTY_STATE: &str = "empty-state";
    pub const FLOW_ITEM: &str = "flow-item";
    pub const ACTIVE: &str = "active";
    pub const ADD_FLOW_BTN: &str = "add-flow-btn";
    pub const FLOW_RUN: &str = "flow-run";
    pub const FLOW_EDIT: &str = "flow-edit";
    pub const FLOW_DELETE: &str = "flow-delete";
    pub const FLOW_HEADER: &str = "flow-header";
    pub const RUN_FLOW_BTN: &str = "run-flow-btn";
    pub const ADD_STEP_BTN: &str = "add-step-btn";
    pub const STEP_ITEM: &str = "step-item";
    pub const STEP_EDIT: &str = "step-edit";
    pub const STEP_DELETE: &str = "step-delete";
}

const DATA_FLOW_ID: &str = "data-flow-id";
const DATA_STEP_ID: &str = "data-step-id";

/// A user intent recognized from a click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    CreateFlow,
    SelectFlow { flow_id: String },
    RunFlow { flow_id: String },
    EditFlow { flow_id: String },
    DeleteFlow { flow_id: String },
    AddStep { flow_id: String },
    EditStep { flow_id: String, step_id: String },
    DeleteStep { flow_id: String, step_id: String },
}

impl UiAction {
    /// Bus topic this action is published on
    pub fn topic(&self) -> &'static str {
        match self {
            UiAction::CreateFlow => topics::FLOW_CREATE,
            UiAction::SelectFlow { .. } => topics::FLOW_SELECT,
            UiAction::RunFlow { .. } => topics::FLOW_RUN,
            UiAction::EditFlow { .. } => topics::FLOW_EDIT,
            UiAction::DeleteFlow { .. } => topics::FLOW_DELETE,
            UiAction::AddStep { .. } => topics::STEP_ADD,
            UiAction::EditStep { .. } => topics::STEP_EDIT,
            UiAction::DeleteStep { .. } => topics::STEP_DELETE,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            UiAction::CreateFlow => json!({}),
            UiAction::SelectFlow { flow_id }
            | UiAction::RunFlow { flow_id }
            | UiAction::EditFlow { flow_id }
            | UiAction::DeleteFlow { flow_id }
            | UiAction::AddStep { flow_id } => json!({"flowId": flow_id}),
            UiAction::EditStep { flow_id, step_id } | UiAction::DeleteStep { flow_id, step_id } => {
                json!({"flowId": flow_id, "stepId": step_id})
            }
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, UiAction::DeleteFlow { .. } | UiAction::DeleteStep { .. })
    }
}

#[derive(Default)]
struct ViewState {
    document: Document,
    flows: Vec<Flow>,
    active: Option<Flow>,
    statuses: HashMap<String, StepStatus>,
}

/// Flow list and step view
///
/// Every render replaces the whole container subtree from the current
/// snapshot, so the same input always yields the same tree. Clicks are
/// resolved against the rendered tree and republished on the bus; the
/// service never calls other services.
pub struct FlowUiService {
    config: UiConfig,
    bus: EventBus,
    logger: SharedLogger,
    confirm: ConfirmFn,
    state: Mutex<ViewState>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl FlowUiService {
    /// Create a service rendering into its own document
    pub fn new(config: UiConfig, bus: EventBus, logger: SharedLogger, confirm: ConfirmFn) -> Arc<Self> {
        let mut document = Document::new();
        document.create_container(&config.flow_list_container);
        document.create_container(&config.flow_steps_container);
        Self::with_document(config, bus, logger, confirm, document)
    }

    /// Create a service rendering into a host-provided document
    pub fn with_document(
        config: UiConfig,
        bus: EventBus,
        logger: SharedLogger,
        confirm: ConfirmFn,
        document: Document,
    ) -> Arc<Self> {
        debug!("FlowUiService::new: called");
        Arc::new(Self {
            config,
            bus,
            logger,
            confirm,
            state: Mutex::new(ViewState {
                document,
                ..Default::default()
            }),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to the flow domain events
    ///
    /// Handlers hold a weak reference, so an attached service can still be
    /// dropped; call [`FlowUiService::detach`] to remove the subscriptions.
    pub fn attach(self: &Arc<Self>) {
        debug!("FlowUiService::attach: called");
        let mut subs = self.subscriptions.lock();
        if !subs.is_empty() {
            return;
        }

        let weak = Arc::downgrade(self);
        subs.push(self.bus.subscribe(topics::FLOWS_LOADED, handler(&weak, |svc, payload| {
            #[derive(Deserialize)]
            struct Loaded {
                #[serde(default)]
                flows: Vec<Flow>,
            }
            let loaded: Loaded = serde_json::from_value(payload.clone()).context("invalid flows:loaded payload")?;
            svc.render_flows(&loaded.flows);
            Ok(())
        })));

        subs.push(self.bus.subscribe(topics::FLOW_ACTIVATED, handler(&weak, |svc, payload| {
            let flow = match payload.get("flow") {
                None | Some(Value::Null) => None,
                Some(raw) => Some(serde_json::from_value::<Flow>(raw.clone()).context("invalid flow:activated payload")?),
            };
            svc.render_active_flow(flow.as_ref());
            Ok(())
        })));

        subs.push(self.bus.subscribe(topics::FLOW_STEP_STATUS, handler(&weak, |svc, payload| {
            let step_id = payload
                .get("stepId")
                .and_then(Value::as_str)
                .ok_or_else(|| eyre::eyre!("flow:step-status payload has no stepId"))?;
            let status: StepStatus = payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .parse()
                .map_err(|e: String| eyre::eyre!(e))?;
            svc.set_step_status(step_id, status);
            Ok(())
        })));

        subs.push(self.bus.subscribe(topics::FLOW_STATUSES_RESET, handler(&weak, |svc, _| {
            svc.reset_step_statuses();
            Ok(())
        })));
    }

    /// Remove the bus subscriptions made by [`FlowUiService::attach`]
    pub fn detach(&self) {
        for sub in self.subscriptions.lock().drain(..) {
            sub.unsubscribe();
        }
    }

    // === Rendering ===

    /// Replace the flow list
    pub fn render_flows(&self, flows: &[Flow]) {
        debug!(count = flows.len(), "FlowUiService::render_flows: called");
        let mut state = self.state.lock();
        state.flows = flows.to_vec();
        let active_id = state.active.as_ref().map(|f| f.id.clone());
        let nodes = flow_list_nodes(flows, active_id.as_deref());
        self.replace(&mut state.document, &self.config.flow_list_container, nodes);
    }

    /// Replace the step view with `flow`, or a placeholder when none is active
    ///
    /// Switching to a different flow forgets the previous step statuses.
    pub fn render_active_flow(&self, flow: Option<&Flow>) {
        debug!(flow = ?flow.map(|f| &f.id), "FlowUiService::render_active_flow: called");
        let mut state = self.state.lock();
        let previous = state.active.as_ref().map(|f| f.id.clone());
        if previous.as_deref() != flow.map(|f| f.id.as_str()) {
            state.statuses.clear();
        }
        state.active = flow.cloned();
        self.redraw(&mut state);
    }

    pub fn set_step_status(&self, step_id: &str, status: StepStatus) {
        debug!(%step_id, %status, "FlowUiService::set_step_status: called");
        let mut state = self.state.lock();
        state.statuses.insert(step_id.to_string(), status);
        self.redraw_steps(&mut state);
    }

    pub fn reset_step_statuses(&self) {
        debug!("FlowUiService::reset_step_statuses: called");
        let mut state = self.state.lock();
        state.statuses.clear();
        self.redraw_steps(&mut state);
    }

    /// Redraw both containers; the flow list marks the active flow
    fn redraw(&self, state: &mut ViewState) {
        let active_id = state.active.as_ref().map(|f| f.id.clone());
        let list = flow_list_nodes(&state.flows, active_id.as_deref());
        self.replace(&mut state.document, &self.config.flow_list_container, list);
        self.redraw_steps(state);
    }

    fn redraw_steps(&self, state: &mut ViewState) {
        let nodes = active_flow_nodes(state.active.as_ref(), &state.statuses);
        self.replace(&mut state.document, &self.config.flow_steps_container, nodes);
    }

    fn replace(&self, document: &mut Document, container: &str, nodes: Vec<Node>) {
        if !document.replace_children(container, nodes) {
            self.logger.log(
                Level::Warn,
                &format!("Container '{}' not found, skipping render", container),
                None,
            );
        }
    }

    // === Interaction ===

    /// Resolve a click on the node at `path` inside `container`
    ///
    /// The closest ancestor carrying an action class decides the intent. Delete
    /// actions only proceed when the confirmation prompt answers yes. The
    /// recognized action is published on the bus and returned.
    pub fn handle_click(&self, container: &str, path: &[usize]) -> Option<UiAction> {
        debug!(%container, ?path, "FlowUiService::handle_click: called");
        let (action, prompt) = {
            let state = self.state.lock();
            let chain = state.document.ancestors(container, path);
            let action = resolve_action(&chain, state.active.as_ref())?;
            let prompt = confirmation_prompt(&action, &state);
            (action, prompt)
        };

        if action.is_destructive() && !(self.confirm)(&prompt) {
            self.logger.log(Level::Debug, "Delete cancelled", Some(&action.payload()));
            return None;
        }

        if let Err(e) = self.bus.emit(action.topic(), action.payload()) {
            warn!(topic = action.topic(), error = %e, "FlowUiService: failed to publish action");
        }
        Some(action)
    }

    /// Click the first node carrying `class` in a container
    pub fn click_first(&self, container: &str, class: &str) -> Option<UiAction> {
        let path = self.state.lock().document.paths_by_class(container, class).into_iter().next()?;
        self.handle_click(container, &path)
    }

    // === Accessors ===

    pub fn flows(&self) -> Vec<Flow> {
        self.state.lock().flows.clone()
    }

    pub fn active_flow(&self) -> Option<Flow> {
        self.state.lock().active.clone()
    }

    pub fn step_status(&self, step_id: &str) -> StepStatus {
        self.state.lock().statuses.get(step_id).copied().unwrap_or_default()
    }

    /// Snapshot of the rendered document
    pub fn document(&self) -> Document {
        self.state.lock().document.clone()
    }

    pub fn render_text(&self, container: &str) -> Option<String> {
        self.state.lock().document.render_text(container)
    }

    pub fn config(&self) -> &UiConfig {
        &self.config
    }
}

impl Drop for FlowUiService {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Wrap a service method as a bus handler holding only a weak reference
fn handler<F>(weak: &Weak<FlowUiService>, f: F) -> impl Fn(&Value) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&FlowUiService, &Value) -> eyre::Result<()> + Send + Sync + 'static,
{
    let weak = weak.clone();
    move |payload: &Value| match weak.upgrade() {
        Some(svc) => f(&svc, payload),
        None => Ok(()),
    }
}

fn resolve_action(chain: &[&Node], active: Option<&Flow>) -> Option<UiAction> {
    let flow_id = || find_attr(chain, DATA_FLOW_ID).or_else(|| active.map(|f| f.id.clone()));
    let step_id = || find_attr(chain, DATA_STEP_ID);

    for node in chain {
        let action = if node.has_class(classes::ADD_FLOW_BTN) {
            Some(UiAction::CreateFlow)
        } else if node.has_class(classes::FLOW_RUN) || node.has_class(classes::RUN_FLOW_BTN) {
            flow_id().map(|flow_id| UiAction::RunFlow { flow_id })
        } else if node.has_class(classes::FLOW_EDIT) {
            flow_id().map(|flow_id| UiAction::EditFlow { flow_id })
        } else if node.has_class(classes::FLOW_DELETE) {
            flow_id().map(|flow_id| UiAction::DeleteFlow { flow_id })
        } else if node.has_class(classes::ADD_STEP_BTN) {
            flow_id().map(|flow_id| UiAction::AddStep { flow_id })
        } else if node.has_class(classes::STEP_EDIT) {
            flow_id()
                .zip(step_id())
                .map(|(flow_id, step_id)| UiAction::EditStep { flow_id, step_id })
        } else if node.has_class(classes::STEP_DELETE) {
            flow_id()
                .zip(step_id())
                .map(|(flow_id, step_id)| UiAction::DeleteStep { flow_id, step_id })
        } else if node.has_class(classes::FLOW_ITEM) {
            flow_id().map(|flow_id| UiAction::SelectFlow { flow_id })
        } else {
            continue;
        };
        return action;
    }
    None
}

fn find_attr(chain: &[&Node], name: &str) -> Option<String> {
    chain.iter().find_map(|n| n.attr_value(name)).map(str::to_string)
}

fn confirmation_prompt(action: &UiAction, state: &ViewState) -> String {
    match action {
        UiAction::DeleteFlow { flow_id } => {
            let name = state
                .flows
                .iter()
                .find(|f| &f.id == flow_id)
                .map(|f| f.name.as_str())
                .unwrap_or(flow_id.as_str());
            format!("Delete flow \"{}\"?", name)
        }
        UiAction::DeleteStep { step_id, .. } => {
            let name = state
                .active
                .as_ref()
                .and_then(|f| f.step(step_id))
                .map(|s| s.name.as_str())
                .unwrap_or(step_id.as_str());
            format!("Delete step \"{}\"?", name)
        }
        _ => String::new(),
    }
}

fn flow_list_nodes(flows: &[Flow], active_id: Option<&str>) -> Vec<Node> {
    if flows.is_empty() {
        return vec![
            Node::new("div")
                .class(classes::EMPTY_STATE)
                .child(Node::new("p").text("No flows yet"))
                .child(Node::new("button").class(classes::ADD_FLOW_BTN).text("Create flow")),
        ];
    }

    let mut nodes: Vec<Node> = flows.iter().map(|flow| flow_item(flow, active_id == Some(flow.id.as_str()))).collect();
    nodes.push(Node::new("button").class(classes::ADD_FLOW_BTN).text("New flow"));
    nodes
}

fn flow_item(flow: &Flow, active: bool) -> Node {
    let mut item = Node::new("div").class(classes::FLOW_ITEM);
    if active {
        item = item.class(classes::ACTIVE);
    }
    let steps = match flow.steps.len() {
        1 => "1 step".to_string(),
        n => format!("{} steps", n),
    };

    let mut item = item
        .attr(DATA_FLOW_ID, &flow.id)
        .child(Node::new("div").class("flow-name").text(&flow.name))
        .child(Node::new("div").class("flow-meta").text(&steps));
    if let Some(description) = &flow.description {
        item = item.child(Node::new("div").class("flow-description").text(description));
    }
    item.child(
        Node::new("div").class("flow-actions").children([
            Node::new("button").class(classes::FLOW_RUN).text("Run"),
            Node::new("button").class(classes::FLOW_EDIT).text("Edit"),
            Node::new("button").class(classes::FLOW_DELETE).text("Delete"),
        ]),
    )
}

fn active_flow_nodes(flow: Option<&Flow>, statuses: &HashMap<String, StepStatus>) -> Vec<Node> {
    let Some(flow) = flow else {
        return vec![
            Node::new("div")
                .class(classes::EMPTY_STATE)
                .child(Node::new("p").text("Select a flow to see its steps")),
        ];
    };

    let mut header = Node::new("div")
        .class(classes::FLOW_HEADER)
        .attr(DATA_FLOW_ID, &flow.id)
        .child(Node::new("h2").text(&flow.name));
    if let Some(description) = &flow.description {
        header = header.child(Node::new("p").class("flow-description").text(description));
    }
    let header = header.child(Node::new("div").class("flow-actions").children([
        Node::new("button").class(classes::RUN_FLOW_BTN).text("Run flow"),
        Node::new("button").class(classes::ADD_STEP_BTN).text("Add step"),
    ]));

    let body = if flow.steps.is_empty() {
        Node::new("div")
            .class(classes::EMPTY_STATE)
            .child(Node::new("p").text("No steps yet"))
    } else {
        Node::new("div")
            .class("step-list")
            .children(flow.steps.iter().map(|step| step_item(step, statuses.get(&step.id).copied().unwrap_or_default())))
    };

    vec![header, body]
}

fn step_item(step: &FlowStep, status: StepStatus) -> Node {
    Node::new("div")
        .class(classes::STEP_ITEM)
        .class(&format!("status-{}", status))
        .attr(DATA_STEP_ID, &step.id)
        .attr("data-step-type", step.kind.type_name())
        .child(Node::new("span").class("step-type").text(step.kind.type_name()))
        .child(Node::new("span").class("step-name").text(&step.name))
        .child(Node::new("span").class("step-summary").text(&step.kind.summary()))
        .child(Node::new("span").class("step-status").text(status.label()))
        .child(Node::new("div").class("step-actions").children([
            Node::new("button").class(classes::STEP_EDIT).text("Edit"),
            Node::new("button").class(classes::STEP_DELETE).text("Delete"),
        ]))
}
