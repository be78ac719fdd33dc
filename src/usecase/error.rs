use thiserror::Error;

use crate::domain::entities::record::ResourceKind;
use crate::usecase::ports::remote::RemoteError;

/// What a list screen reports to the user. Both variants leave the list as it
/// was before the failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("Failed to fetch {noun}. Please try again.")]
    Fetch {
        noun: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to {action} {noun}.")]
    Mutation {
        action: &'static str,
        noun: &'static str,
        #[source]
        source: RemoteError,
    },
}

impl ListError {
    pub fn fetch(kind: ResourceKind, source: RemoteError) -> Self {
        ListError::Fetch {
            noun: kind.noun(),
            source,
        }
    }

    pub fn mutation(action: &'static str, kind: ResourceKind, source: RemoteError) -> Self {
        ListError::Mutation {
            action,
            noun: kind.singular(),
            source,
        }
    }

    pub fn remote(&self) -> &RemoteError {
        match self {
            ListError::Fetch { source, .. } | ListError::Mutation { source, .. } => source,
        }
    }

    /// Field-level validation messages from the backend, if any.
    pub fn detail(&self) -> Option<String> {
        self.remote().field_detail()
    }
}
