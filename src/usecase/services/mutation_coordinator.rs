use std::sync::Arc;

use tracing::info;

use crate::domain::entities::record::Record;
use crate::ui::state::list_controller::ListController;
use crate::usecase::error::ListError;
use crate::usecase::ports::remote::RemoteFetchAdapter;
use crate::usecase::services::edit_service::EditService;

#[derive(Clone)]
pub struct MutationCoordinator {
    edits: EditService,
}

impl MutationCoordinator {
    pub fn new(remote: Arc<dyn RemoteFetchAdapter>) -> Self {
        Self {
            edits: EditService::new(remote),
        }
    }

    /// Removes `id` remotely and reloads the list from the same query.
    /// The local source set is never edited in place: a failed delete leaves
    /// the list exactly as it was, a successful one shows up via the reload,
    /// which also pulls the page back inside the shorter result.
    pub async fn delete_record<R: Record>(
        &self,
        list: &mut ListController<R>,
        id: i64,
    ) -> Result<(), ListError> {
        self.edits
            .delete(R::KIND, id)
            .await
            .map_err(|err| ListError::mutation("delete", R::KIND, err))?;

        info!(kind = %R::KIND, id, "reloading after delete");
        list.refresh().await
    }
}
