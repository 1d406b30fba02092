use serde::{Deserialize, Serialize};

/// Route module exports eligible for wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetName {
    Loader,
    Action,
    ClientLoader,
    ClientAction,
}

/// Which runtime a target export executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Surface {
    Server,
    Client,
}

impl TargetName {
    pub const ALL: [TargetName; 4] = [
        TargetName::Loader,
        TargetName::Action,
        TargetName::ClientLoader,
        TargetName::ClientAction,
    ];

    /// The export name as written in source.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetName::Loader => "loader",
            TargetName::Action => "action",
            TargetName::ClientLoader => "clientLoader",
            TargetName::ClientAction => "clientAction",
        }
    }

    pub fn from_export_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn surface(self) -> Surface {
        match self {
            TargetName::Loader | TargetName::Action => Surface::Server,
            TargetName::ClientLoader | TargetName::ClientAction => Surface::Client,
        }
    }

    /// `loader` -> `Loader`, `clientAction` -> `ClientAction`.
    pub fn pascal_case(self) -> &'static str {
        match self {
            TargetName::Loader => "Loader",
            TargetName::Action => "Action",
            TargetName::ClientLoader => "ClientLoader",
            TargetName::ClientAction => "ClientAction",
        }
    }
}

impl std::fmt::Display for TargetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_names_round_trip() {
        for target in TargetName::ALL {
            assert_eq!(TargetName::from_export_name(target.as_str()), Some(target));
        }
        assert_eq!(TargetName::from_export_name("default"), None);
        assert_eq!(TargetName::from_export_name("Loader"), None);
    }

    #[test]
    fn surfaces_split_server_and_client() {
        assert_eq!(TargetName::Action.surface(), Surface::Server);
        assert_eq!(TargetName::ClientLoader.surface(), Surface::Client);
    }
}
