//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_VALIDATE: &str = "/auth/validate";

pub const POST_USERS: &str = "/users";
pub const GET_USERS_ME: &str = "/users/me";
/// `GET`, `PATCH` and `DELETE`.
pub const USERS_ID: &str = "/users/{id}";
pub const PUT_USERS_ID_PASSWORD: &str = "/users/{id}/password";
