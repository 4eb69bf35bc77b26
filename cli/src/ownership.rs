//! Which libraries did a given user create?

use crate::model::{CurrentUser, Library};

/// Library id used for chat suggestions when the user owns no library.
pub const DEFAULT_LIBRARY: &str = "Default Library";

/// The identity a library's creator is compared against.
#[derive(Debug, Clone, Copy)]
pub struct Owner<'a> {
    pub id: Option<&'a str>,
    pub username: Option<&'a str>,
}

impl<'a> From<&'a CurrentUser> for Owner<'a> {
    fn from(user: &'a CurrentUser) -> Self {
        Self {
            id: user.id.as_deref(),
            username: user.username.as_deref(),
        }
    }
}

/// True if `library` was created by `owner`: the creator id matches as a
/// string, or failing that the creator username matches exactly.
pub fn is_owned_by(library: &Library, owner: Owner<'_>) -> bool {
    let Some(creator) = &library.created_by else {
        return false;
    };
    let id_match = matches!(
        (creator.id.as_deref(), owner.id),
        (Some(a), Some(b)) if a == b
    );
    let name_match = matches!(
        (creator.username.as_deref(), owner.username),
        (Some(a), Some(b)) if a == b
    );
    id_match || name_match
}

/// The subset of `libraries` created by `owner`, in their original order.
pub fn owned_by<'l>(libraries: &'l [Library], owner: Owner<'_>) -> Vec<&'l Library> {
    libraries.iter().filter(|lib| is_owned_by(lib, owner)).collect()
}

/// The id attached to chat suggestions: the last owned library, or [`DEFAULT_LIBRARY`].
pub fn suggestion_library_id(owned: &[&Library]) -> String {
    owned
        .last()
        .map(|lib| lib.id.clone())
        .unwrap_or_else(|| DEFAULT_LIBRARY.to_string())
}
