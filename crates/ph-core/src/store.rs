use crate::collections::CollectionIndex;
use crate::error::PanhandlerError;
use crate::events::EventRepository;
use crate::repos::RepositoryIndex;
use crate::skillets::SkilletIndex;

pub trait Store {
    type Repositories<'a>: RepositoryIndex
    where
        Self: 'a;
    type Skillets<'a>: SkilletIndex
    where
        Self: 'a;
    type Collections<'a>: CollectionIndex
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;

    fn repositories(&self) -> Self::Repositories<'_>;
    fn skillets(&self) -> Self::Skillets<'_>;
    fn collections(&self) -> Self::Collections<'_>;
    fn events(&self) -> Self::Events<'_>;

    /// Runs `f` in one write transaction. Nothing `f` wrote survives an
    /// error.
    fn with_tx<F, T>(&self, f: F) -> Result<T, PanhandlerError>
    where
        F: FnOnce(&Self) -> Result<T, PanhandlerError>;
}
