use std::future::Future;

use roster_store::Row;
use tracing::{debug, error};

use super::requests::{
    CreateRecordsRequest,
    DeleteRecordsRequest,
    ReadRowsRequest,
    UpdateRecordsRequest,
};
use super::{ClientId, ControlError, DataControlPlane};
use crate::store::{StoreResult, TableStore};

impl<S: TableStore> DataControlPlane<S> {
    /// Reads rows from a table.
    ///
    /// # Errors
    /// Returns `ControlError` on invalid input, rate limiting, or a failed
    /// database call.
    pub async fn read_rows(
        &self,
        client: &ClientId,
        request: ReadRowsRequest,
    ) -> Result<Vec<Row>, ControlError> {
        let read = request.validate()?;
        self.admit(client).await?;
        let rows = self
            .call("read_rows", &read.table, self.store().select(&read.table, &read.query))
            .await?;
        debug!(table = %read.table, rows = rows.len(), "read rows");
        Ok(rows)
    }

    /// Inserts records into a table and returns them as stored.
    ///
    /// # Errors
    /// Returns `ControlError` on invalid input, rate limiting, or a failed
    /// database call.
    pub async fn create_records(
        &self,
        client: &ClientId,
        request: CreateRecordsRequest,
    ) -> Result<Vec<Row>, ControlError> {
        let create = request.validate()?;
        self.admit(client).await?;
        let rows = self
            .call(
                "create_records",
                &create.table,
                self.store().insert(&create.table, create.rows),
            )
            .await?;
        debug!(table = %create.table, rows = rows.len(), "created records");
        Ok(rows)
    }

    /// Applies `updates` to every row matching the filters.
    ///
    /// # Errors
    /// Returns `ControlError` on invalid input, rate limiting, or a failed
    /// database call.
    pub async fn update_records(
        &self,
        client: &ClientId,
        request: UpdateRecordsRequest,
    ) -> Result<Vec<Row>, ControlError> {
        let update = request.validate()?;
        self.admit(client).await?;
        let rows = self
            .call(
                "update_records",
                &update.table,
                self.store().update(&update.table, update.values, &update.filter),
            )
            .await?;
        debug!(table = %update.table, filter = %update.filter, rows = rows.len(), "updated records");
        Ok(rows)
    }

    /// Deletes every row matching the filters and returns the deleted rows.
    ///
    /// # Errors
    /// Returns `ControlError` on invalid input, rate limiting, or a failed
    /// database call.
    pub async fn delete_records(
        &self,
        client: &ClientId,
        request: DeleteRecordsRequest,
    ) -> Result<Vec<Row>, ControlError> {
        let delete = request.validate()?;
        self.admit(client).await?;
        let rows = self
            .call(
                "delete_records",
                &delete.table,
                self.store().delete(&delete.table, &delete.filter),
            )
            .await?;
        debug!(table = %delete.table, filter = %delete.filter, rows = rows.len(), "deleted records");
        Ok(rows)
    }

    async fn admit(&self, client: &ClientId) -> Result<(), ControlError> {
        self.limiter().check(client.as_str()).await?;
        Ok(())
    }

    async fn call<F>(&self, operation: &str, table: &str, call: F) -> Result<Vec<Row>, ControlError>
    where
        F: Future<Output = StoreResult<Vec<Row>>> + Send,
    {
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(operation, table, timeout_secs = limit.as_secs_f64(), "database call timed out");
                    return Err(ControlError::Timeout(limit));
                }
            },
            None => call.await,
        };
        outcome.map_err(|err| {
            error!(operation, table, error = %err, "database call failed");
            ControlError::Store(err)
        })
    }
}
