pub mod evaluator;
pub mod license;
pub mod session;

pub use evaluator::{
    AccessPolicyEvaluator, PasswordAgeReport, PolicyDecision, PolicyReport, PolicyRequest,
    Preloaded, evaluate_policies,
};
pub use license::{LicenseGate, StaticLicense};
pub use session::{
    IssuedAt, MaxSessionLengthReport, SessionLengthCheck, check_session_length,
    check_session_length_at,
};
