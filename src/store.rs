use futures::future::BoxFuture;
use mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT;
use mongodb::{Client, ClientSession, Collection, Database};

use crate::config::Config;
use crate::error::ApiError;
use crate::schemas::{Expense, Group, Settlement};

const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Handle to the document store. Constructed once at startup and cloned into
/// each worker; cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct Store {
    client: Client,
    db: Database,
}

impl Store {
    pub async fn connect(config: &Config) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(&config.mongodb_uri).await?;
        let db = client.database(&config.database);
        Ok(Self { client, db })
    }

    pub fn groups(&self) -> Collection<Group> {
        self.db.collection("groups")
    }

    pub fn expenses(&self) -> Collection<Expense> {
        self.db.collection("expenses")
    }

    pub fn settlements(&self) -> Collection<Settlement> {
        self.db.collection("settlements")
    }

    /// Runs `operation` inside a multi-document transaction: commit when it
    /// returns `Ok`, abort on any error path. Transient aborts (two writers
    /// hitting the same group document) restart the whole operation from its
    /// initial read, up to a bounded number of attempts, so concurrent
    /// balance updates serialize instead of losing writes.
    ///
    /// `context` carries the operation's inputs; it is lent to the callback
    /// together with the session on every attempt.
    pub async fn run_transaction<C, T, F>(
        &self,
        mut context: C,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: for<'s> FnMut(
            &'s Store,
            &'s mut ClientSession,
            &'s mut C,
        ) -> BoxFuture<'s, Result<T, ApiError>>,
    {
        let mut attempts = 0;
        'attempt: loop {
            attempts += 1;
            let mut session = self.client.start_session(None).await?;
            session.start_transaction(None).await?;

            match operation(self, &mut session, &mut context).await {
                Ok(value) => loop {
                    match session.commit_transaction().await {
                        Ok(()) => return Ok(value),
                        Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                            continue;
                        }
                        Err(err) => {
                            let err = ApiError::from(err);
                            if err.is_transient() && attempts < MAX_TRANSACTION_ATTEMPTS {
                                continue 'attempt;
                            }
                            return Err(err);
                        }
                    }
                },
                Err(err) => {
                    // A failed abort only matters if the commit path is
                    // reached, which it is not.
                    let _ = session.abort_transaction().await;
                    if err.is_transient() && attempts < MAX_TRANSACTION_ATTEMPTS {
                        tracing::warn!(attempts, "transient transaction abort, retrying");
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}
