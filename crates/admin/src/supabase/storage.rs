//! Supabase Storage blob upload and public URL resolution.

use reqwest::Method;
use tracing::instrument;

use super::{Credential, SupabaseClient, SupabaseError};

impl SupabaseClient {
    /// Upload an object into a bucket.
    ///
    /// Existing objects are not overwritten; the service rejects duplicates.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the upload is rejected.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SupabaseError> {
        let request = self
            .request(
                Method::POST,
                self.url(&format!("/storage/v1/object/{bucket}/{}", encode_path(path))),
                Credential::Anon,
            )?
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);

        self.send(request).await?;
        Ok(())
    }

    /// Public URL for an object in a public bucket.
    #[must_use]
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!(
            "/storage/v1/object/public/{bucket}/{}",
            encode_path(path)
        ))
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
