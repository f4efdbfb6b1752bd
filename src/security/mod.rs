//! Security: roles, policy, and the candidate-query validator.

pub mod policy;
pub mod validator;
