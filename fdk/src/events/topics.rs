//! Topic names used across the runtime

// === Flow UI (published by FlowUiService) ===
pub const FLOW_SELECT: &str = "flow:select";
pub const FLOW_CREATE: &str = "flow:create";
pub const FLOW_DELETE: &str = "flow:delete";
pub const FLOW_EDIT: &str = "flow:edit";
pub const FLOW_RUN: &str = "flow:run";
pub const STEP_ADD: &str = "step:add";
pub const STEP_EDIT: &str = "step:edit";
pub const STEP_DELETE: &str = "step:delete";

// === Flow domain (consumed by FlowUiService) ===
pub const FLOWS_LOADED: &str = "flows:loaded";
pub const FLOW_ACTIVATED: &str = "flow:activated";
pub const FLOW_STEP_STATUS: &str = "flow:step-status";
pub const FLOW_STATUSES_RESET: &str = "flow:statuses-reset";

// === Endpoint catalog ===
pub const ENDPOINTS_LOADING: &str = "endpoints:loading";
pub const ENDPOINTS_LOADED: &str = "endpoints:loaded";
pub const ENDPOINTS_ERROR: &str = "endpoints:error";
pub const ENDPOINTS_RETRY: &str = "endpoints:retry";
pub const ENDPOINTS_REFRESHING: &str = "endpoints:refreshing";
pub const ENDPOINTS_REFRESHED: &str = "endpoints:refreshed";
pub const ENDPOINTS_REFRESH_ERROR: &str = "endpoints:refresh-error";
pub const ENDPOINTS_CUSTOM_ADDED: &str = "endpoints:custom-added";
pub const ENDPOINTS_CUSTOM_REMOVED: &str = "endpoints:custom-removed";

// === Auth ===
pub const AUTH_INITIALIZED: &str = "auth:initialized";
pub const AUTH_LOGIN: &str = "auth:login";
pub const AUTH_LOGOUT: &str = "auth:logout";
pub const AUTH_PROFILE_UPDATED: &str = "auth:profile-updated";
pub const AUTH_SESSION_EXPIRED: &str = "auth:session-expired";
