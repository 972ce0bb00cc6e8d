//! Batch protocol handling: validate a batch request and presign every object.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::batch::{
    Action, BatchObject, BatchRequest, BatchRequestObject, BatchResponse, Operation,
};
use crate::endpoint::StoreOptions;
use crate::signer::Presigner;
use crate::{Error, Result};

/// Answer one batch request body.
///
/// Validation happens before any signing: an unsupported hash algorithm is
/// a 409, an unknown operation a 422. Each object is then signed in its own
/// task; the response lists objects in request order. If any object fails,
/// the whole batch fails. Dropping the returned future aborts signing tasks
/// that are still running.
pub async fn handle(
    body: &[u8],
    options: &StoreOptions,
    bucket: &str,
    default_expiry: u64,
) -> Result<BatchResponse> {
    let request = BatchRequest::from_slice(body)?;
    let operation = request.validate()?;
    let expires_in = options.expiry.unwrap_or(default_expiry);

    debug!(
        %operation,
        objects = request.objects.len(),
        bucket,
        expires_in,
        "signing batch"
    );

    let signer = Arc::new(Presigner::new(options));
    let bucket: Arc<str> = Arc::from(bucket);
    let count = request.objects.len();

    let mut tasks = JoinSet::new();
    for (idx, object) in request.objects.into_iter().enumerate() {
        let signer = Arc::clone(&signer);
        let bucket = Arc::clone(&bucket);
        tasks.spawn(async move {
            let result = sign_object(&signer, &bucket, operation, expires_in, &object)
                .map(|href| BatchObject::signed(&object, operation, Action { href, expires_in }));
            (idx, result)
        });
    }

    let mut signed: Vec<Option<BatchObject>> = vec![None; count];
    while let Some(joined) = tasks.join_next().await {
        let (idx, result) = joined.map_err(|e| Error::Signing(e.to_string()))?;
        signed[idx] = Some(result?);
    }

    let objects = signed
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::Signing("signing task result missing".into()))?;

    Ok(BatchResponse::new(objects))
}

fn sign_object(
    signer: &Presigner,
    bucket: &str,
    operation: Operation,
    expires_in: u64,
    object: &BatchRequestObject,
) -> Result<String> {
    signer
        .sign(bucket, &object.oid, &operation.method(), expires_in)
        .map(String::from)
        .map_err(|e| {
            warn!(oid = %object.oid, error = %e, "failed to sign object");
            e
        })
}
