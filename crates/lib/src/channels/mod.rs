//! Messaging channels.
//!
//! The Messenger connector parses webhook deliveries and sends replies through the
//! Send API; image attachments are downloaded with an [`ImageFetcher`].
//! The dispatcher only sees [`InboundEvent`]s and the [`ChannelHandle`] trait.

mod attachment;
mod handle;
mod inbound;
mod messenger;

pub use attachment::{FetchError, FetchedImage, HttpImageFetcher, ImageFetcher};
pub use handle::ChannelHandle;
pub use inbound::{EventPayload, InboundEvent};
pub use messenger::{
    Attachment, AttachmentPayload, MessagingEvent, MessengerChannel, MessengerMessage, Party,
    Postback, WebhookPayload,
};
