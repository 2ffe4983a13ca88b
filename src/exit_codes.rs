//! Exit code constants for workflow-templater.
//!
//! - 0: Success
//! - 1: User error (bad args, bad config, malformed template file)
//! - 2: Template failure (evaluation, unresolved reference, missing field)
//! - 3: Transport failure (tracker API or mail transport)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, configuration, or template file layout.
pub const USER_ERROR: i32 = 1;

/// Template failure: a value could not be rendered or a required field is absent.
pub const TEMPLATE_FAILURE: i32 = 2;

/// Transport failure: the tracker or mail collaborator reported an error.
pub const TRANSPORT_FAILURE: i32 = 3;
