//! Message - the unit of communication between modules.
//!
//! A `Message` is an immutable value: a header (identity and correlation),
//! a router (who sent it and what it is about), and a payload. New messages
//! and derived messages (copies, responses, errors) are produced through
//! [`MessageBuilder`] so concurrently running modules never share a mutable
//! message.
//!
//! Correlation rules:
//! - a response's `parent_id` is the id of the request it answers
//! - an error's `parent_id` is the *request's* `parent_id`, one hop further
//!   up the chain than a response

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{MessageId, Result};

pub mod content;
pub mod enums;

pub use content::Content;
pub use enums::{Operation, ResourceType};

/// Identity and correlation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(rename = "msg_id", deserialize_with = "non_empty_id")]
    pub id: MessageId,

    #[serde(
        rename = "parent_msg_id",
        default,
        deserialize_with = "empty_id_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<MessageId>,

    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,

    #[serde(
        rename = "resourceversion",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_version: Option<String>,

    /// Set only by the kernel's synchronous send path.
    #[serde(default, skip_serializing_if = "is_false")]
    pub sync: bool,
}

/// Routing fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageRoute {
    /// Where the message comes from.
    #[serde(default)]
    pub source: String,

    /// Group the message is broadcast to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// One unit of communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    header: MessageHeader,
    router: MessageRoute,
    #[serde(default)]
    content: Content,
}

impl Message {
    /// Fresh id, current timestamp, given parent.
    pub fn new(parent_id: Option<MessageId>) -> Self {
        let mut builder = MessageBuilder::new();
        builder.header.parent_id = parent_id;
        builder.build()
    }

    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Re-open this message for derivation. Keeps every field, id included.
    pub fn to_builder(&self) -> MessageBuilder {
        MessageBuilder {
            header: self.header.clone(),
            router: self.router.clone(),
            content: self.content.clone(),
        }
    }

    /// Copy with a fresh id, for handing one message to several recipients.
    ///
    /// Parent, timestamp, router, resource version and content are kept;
    /// the sync flag is cleared.
    pub fn clone_with_new_id(&self) -> Self {
        let mut copy = self.clone();
        copy.header.id = MessageId::new();
        copy.header.sync = false;
        copy
    }

    /// Response to `original`: parented on `original.id`, routed back with
    /// the original resource as source.
    pub fn new_response(original: &Message, content: impl Into<Content>) -> Self {
        let mut builder = MessageBuilder::new()
            .parent_id(original.id().clone())
            .operation(Operation::Response)
            .content(content);
        if let Some(resource) = original.resource() {
            builder = builder.source(resource).resource(resource);
        }
        if let Some(group) = original.group() {
            builder = builder.group(group);
        }
        builder.build()
    }

    /// Error reply to `original`, parented on `original.parent_id`.
    pub fn new_error(original: &Message, error: impl Into<String>) -> Self {
        let mut builder = MessageBuilder::new()
            .operation(Operation::Error)
            .content(Content::Text(error.into()));
        builder.header.parent_id = original.parent_id().cloned();
        if let Some(resource) = original.resource() {
            builder = builder.resource(resource);
        }
        builder.build()
    }

    pub(crate) fn into_sync(mut self) -> Self {
        self.header.sync = true;
        self
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn router(&self) -> &MessageRoute {
        &self.router
    }

    pub fn id(&self) -> &MessageId {
        &self.header.id
    }

    pub fn parent_id(&self) -> Option<&MessageId> {
        self.header.parent_id.as_ref()
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.header.resource_version.as_deref()
    }

    pub fn is_sync(&self) -> bool {
        self.header.sync
    }

    pub fn source(&self) -> &str {
        &self.router.source
    }

    pub fn group(&self) -> Option<&str> {
        self.router.group.as_deref()
    }

    pub fn operation(&self) -> Option<Operation> {
        self.router.operation
    }

    pub fn resource(&self) -> Option<&str> {
        self.router.resource.as_deref()
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    /// Payload as bytes: raw content unchanged, anything else JSON-encoded.
    pub fn content_data(&self) -> Result<Bytes> {
        self.content.to_bytes()
    }
}

/// Builder for [`Message`]. `new()` assigns a fresh id and the current time.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: MessageHeader,
    router: MessageRoute,
    content: Content,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            header: MessageHeader {
                id: MessageId::new(),
                parent_id: None,
                timestamp: Utc::now().timestamp_millis(),
                resource_version: None,
                sync: false,
            },
            router: MessageRoute::default(),
            content: Content::Empty,
        }
    }

    pub fn id(mut self, id: MessageId) -> Self {
        self.header.id = id;
        self
    }

    pub fn parent_id(mut self, parent_id: MessageId) -> Self {
        self.header.parent_id = Some(parent_id);
        self
    }

    pub fn timestamp(mut self, timestamp_ms: i64) -> Self {
        self.header.timestamp = timestamp_ms;
        self
    }

    pub fn resource_version(mut self, version: impl Into<String>) -> Self {
        self.header.resource_version = non_empty(version.into());
        self
    }

    /// Set source and group together.
    pub fn route(self, source: impl Into<String>, group: impl Into<String>) -> Self {
        self.source(source).group(group)
    }

    /// Set resource and operation together.
    pub fn resource_operation(self, resource: impl Into<String>, operation: Operation) -> Self {
        self.resource(resource).operation(operation)
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.router.source = source.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.router.group = non_empty(group.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.router.resource = non_empty(resource.into());
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.router.operation = Some(operation);
        self
    }

    pub fn content(mut self, content: impl Into<Content>) -> Self {
        self.content = content.into();
        self
    }

    pub fn build(self) -> Message {
        Message {
            header: self.header,
            router: self.router,
            content: self.content,
        }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Peers omit empty strings inconsistently; treat `""` like a missing field.
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

fn non_empty_id<'de, D>(deserializer: D) -> std::result::Result<MessageId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    MessageId::from_string(raw).map_err(serde::de::Error::custom)
}

fn empty_id_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<MessageId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(empty_as_none(deserializer)?.and_then(|s| MessageId::from_string(s).ok()))
}
