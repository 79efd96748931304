use crate::types::collection::Collection;
use crate::types::repository::Repository;
use chrono::{DateTime, Utc};
use ph_events::{EventRecord, EventSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub seq: i64,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    RepositoryImported {
        repository: Repository,
    },
    RepositoryUpdated {
        name: String,
        status: String,
    },
    RepositoryRemoved {
        name: String,
    },
    RepositoryPushed {
        name: String,
        status: String,
    },
    DeployKeyChanged {
        name: String,
    },

    SkilletAdded {
        name: String,
        repository: String,
    },
    SkilletUpdated {
        name: String,
        repository: String,
    },
    SkilletRemoved {
        name: String,
        repository: String,
    },
    DuplicateSkilletRejected {
        name: String,
        repository: String,
        existing_repository: String,
    },

    FavoriteCreated {
        collection: Collection,
    },
    FavoriteDeleted {
        name: String,
    },
    FavoritesAssigned {
        skillet: String,
        collections: Vec<String>,
    },
}

impl TryFrom<EventRecord> for Event {
    type Error = serde_json::Error;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            body: serde_json::from_value(record.body)?,
            id: record.id,
            seq: record.seq,
            at: record.at,
            correlation_id: record.correlation_id,
            source: record.source,
        })
    }
}
