use uuid::Uuid;

pub const COLLECTION: &str = "col";
pub const PRINCIPAL: &str = "prin";
pub const POLICY: &str = "pol";
pub const RECORD: &str = "rec";
pub const TOKEN: &str = "tok";
pub const SUBJECT: &str = "sub";

/// Mints an opaque `{prefix}_{hex}` identifier with 128 bits of randomness.
/// The prefix names the entity kind for debugging; it carries no authority.
#[must_use]
pub fn generate(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}
