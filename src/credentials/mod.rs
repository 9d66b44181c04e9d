// Obscura — Credentials Module
//
// Account secrets never touch the database in the clear. This module owns
// the Argon2id password hasher and the parser for the `address:password`
// credential string clients send with every vault request.

mod error;
mod hasher;
mod parse;

pub use error::{CredentialsError, HashError};
pub use hasher::{Argon2Hasher, SecretHasher, DEFAULT_M_COST, DEFAULT_P_COST, DEFAULT_T_COST};
pub use parse::Credentials;
