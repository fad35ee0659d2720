mod claims;
mod jwt;

pub use jwt::AuthUser;

#[cfg(test)]
pub use claims::TokenKind;
#[cfg(test)]
pub use jwt::sign_token;
