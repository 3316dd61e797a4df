pub mod stager;
pub mod validator;
pub mod verifier;
