use crate::error::EngineError;
use core_types::{AccountId, EntryId, LedgerEntry};
use futures::stream::{self, BoxStream, StreamExt};
use ledger::LedgerStore;
use std::sync::Arc;

/// Where a history stream resumes from.
struct HistoryCursor {
    store: Arc<dyn LedgerStore>,
    account_id: AccountId,
    after: Option<EntryId>,
    exhausted: bool,
}

/// Streams an account's entries oldest first, fetching `page_size` at a time.
///
/// The stream ends after the first short page or after the first error. To
/// resume an interrupted stream, pass the id of the last entry received as `after`.
pub(crate) fn entry_stream(
    store: Arc<dyn LedgerStore>,
    account_id: AccountId,
    after: Option<EntryId>,
    page_size: usize,
) -> BoxStream<'static, Result<LedgerEntry, EngineError>> {
    let page_size = page_size.max(1);
    let cursor = HistoryCursor {
        store,
        account_id,
        after,
        exhausted: false,
    };

    stream::unfold(cursor, move |mut cursor| async move {
        if cursor.exhausted {
            return None;
        }
        match cursor
            .store
            .history(cursor.account_id, cursor.after, page_size)
            .await
        {
            Ok(page) => {
                let last = page.last()?.id;
                cursor.after = Some(last);
                cursor.exhausted = page.len() < page_size;
                Some((Ok(page), cursor))
            }
            Err(err) => {
                cursor.exhausted = true;
                Some((Err(EngineError::from(err)), cursor))
            }
        }
    })
    .flat_map(|page| {
        let entries: Vec<Result<LedgerEntry, EngineError>> = match page {
            Ok(entries) => entries.into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        stream::iter(entries)
    })
    .boxed()
}
