//! InterlocutorGateway trait definition.
//!
//! This is the contract every concrete LLM backend satisfies. The memory
//! engine never sees a vendor's wire format: backends differ only in how
//! they render the uniform request into provider JSON and parse usage
//! fields back into the canonical `GatewayReply` shape.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition). The `kind`
//! tag on a request must be echoed back unchanged -- it is what routes a
//! reply to the correct handling logic regardless of arrival order.

pub mod scripted;

use tether_types::gateway::{FilePurpose, GatewayError, GatewayReply, TurnRequest, UploadedFile};

/// Abstract async backend contract for chat turns and file lifecycle.
pub trait InterlocutorGateway: Send + Sync {
    /// Human-readable backend name (e.g. "openai", "scripted").
    fn name(&self) -> &str;

    /// Produce exactly one reply or exactly one error for the request.
    ///
    /// The reply must carry the request's `id` and `kind` unchanged.
    fn send_request(
        &self,
        request: TurnRequest,
    ) -> impl std::future::Future<Output = Result<GatewayReply, GatewayError>> + Send;

    /// Upload a file for later reference in requests.
    fn upload_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        purpose: FilePurpose,
    ) -> impl std::future::Future<Output = Result<UploadedFile, GatewayError>> + Send;

    /// Delete a remote file. Resolves to whether the remote side confirmed
    /// the deletion.
    fn delete_file(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, GatewayError>> + Send;
}
