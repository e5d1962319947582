//! Policy subjects: typed names for nodes of the policy graph

use std::fmt;

use crate::models::Id;

/// A node of the policy graph
///
/// The string form `<type>_<id>` is produced by [`Subject::encode`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Permission(Id),
    Menu(Id),
    Button(Id),
    Role(Id),
}

impl Subject {
    /// Role held implicitly by every authenticated user
    pub const BASE_ROLE: Subject = Subject::Role(0);

    pub fn encode(&self) -> String {
        match self {
            Subject::Permission(id) => format!("permission_{id}"),
            Subject::Menu(id) => format!("menu_{id}"),
            Subject::Button(id) => format!("button_{id}"),
            Subject::Role(id) => format!("role_{id}"),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(Subject::Permission(42).encode(), "permission_42");
        assert_eq!(Subject::Menu(7).encode(), "menu_7");
        assert_eq!(Subject::Button(3).encode(), "button_3");
        assert_eq!(Subject::Role(3).encode(), "role_3");
        assert_eq!(Subject::BASE_ROLE.to_string(), "role_0");
    }

    #[test]
    fn test_same_id_different_types_do_not_collide() {
        let encoded = [
            Subject::Permission(1).encode(),
            Subject::Menu(1).encode(),
            Subject::Button(1).encode(),
            Subject::Role(1).encode(),
        ];
        for (i, a) in encoded.iter().enumerate() {
            for b in &encoded[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
