// SPDX-License-Identifier: MIT OR Apache-2.0
//! Prioritized probe paths and key-search allowlists per extraction
//! target. Paths cover the shapes seen across BSP payload generations;
//! keys are lowercase for the case-insensitive fallback search.

pub(crate) const EVENT_HINT_KEYS: &[&str] = &["event", "type", "eventType", "event_type", "topic"];

// -- provider event id -------------------------------------------------------

pub(crate) const PROVIDER_EVENT_ID_PATHS: &[&str] =
    &["eventId", "event_id", "payload.eventId", "payload.event_id"];
pub(crate) const PROVIDER_EVENT_ID_KEYS: &[&str] = &["eventid"];

// -- message events ----------------------------------------------------------

pub(crate) const MESSAGE_ID_PATHS: &[&str] =
    &["statuses[0].id", "payload.id", "messageId", "message.id"];
pub(crate) const MESSAGE_ID_KEYS: &[&str] = &["messageid", "gsid"];

pub(crate) const WHATSAPP_ID_PATHS: &[&str] = &[
    "statuses[0].meta.whatsappMessageId",
    "payload.whatsappMessageId",
    "whatsappMessageId",
    "messages[0].id",
];
pub(crate) const WHATSAPP_ID_KEYS: &[&str] = &["whatsappmessageid", "wamid"];

pub(crate) const MESSAGE_STATUS_PATHS: &[&str] =
    &["statuses[0].status", "payload.type", "eventType", "status"];

pub(crate) const MESSAGE_TS_PATHS: &[&str] =
    &["statuses[0].timestamp", "payload.timestamp", "timestamp", "ts"];

pub(crate) const ERROR_CODE_PATHS: &[&str] = &[
    "statuses[0].errors[0].code",
    "errors[0].code",
    "payload.error.code",
    "payload.errors[0].code",
];
pub(crate) const ERROR_REASON_PATHS: &[&str] = &[
    "statuses[0].errors[0].message",
    "statuses[0].errors[0].title",
    "errors[0].message",
    "errors[0].title",
    "payload.error.message",
    "payload.errors[0].message",
];
pub(crate) const ERROR_PAYLOAD_PATHS: &[&str] =
    &["statuses[0].errors", "errors", "payload.error", "payload.errors"];

// -- template events ---------------------------------------------------------

pub(crate) const TEMPLATE_NAME_PATHS: &[&str] = &[
    "template.name",
    "payload.elementName",
    "payload.templateName",
    "templateName",
    "elementName",
];
pub(crate) const TEMPLATE_NAME_KEYS: &[&str] = &["templatename", "elementname"];

pub(crate) const TEMPLATE_ID_PATHS: &[&str] =
    &["template.id", "templateId", "payload.templateId", "payload.id"];
pub(crate) const TEMPLATE_ID_KEYS: &[&str] = &["templateid"];

pub(crate) const TEMPLATE_STATUS_PATHS: &[&str] =
    &["template.status", "payload.status", "status", "templateStatus"];

pub(crate) const TEMPLATE_LANG_PATHS: &[&str] = &[
    "template.language",
    "payload.languageCode",
    "language",
    "languageCode",
];

pub(crate) const TEMPLATE_REJECT_REASON_PATHS: &[&str] = &[
    "template.rejectedReason",
    "payload.rejectedReason",
    "rejectedReason",
    "reason",
];

pub(crate) const TEMPLATE_CORRECT_CATEGORY_PATHS: &[&str] = &[
    "template.correctCategory",
    "payload.correctCategory",
    "correctCategory",
];

pub(crate) const TEMPLATE_TS_PATHS: &[&str] = &["timestamp", "payload.timestamp", "ts"];

// -- user / consent events ---------------------------------------------------

pub(crate) const CONSENT_PATHS: &[&str] =
    &["event", "payload.type", "type", "action", "payload.event"];

pub(crate) const PHONE_PATHS: &[&str] = &[
    "phone",
    "payload.phone",
    "payload.sender.phone",
    "sender.phone",
    "user.phone",
    "waNumber",
    "payload.destination",
    "destination",
];
pub(crate) const PHONE_KEYS: &[&str] = &["phone", "msisdn", "waid", "wanumber"];

pub(crate) const USER_TS_PATHS: &[&str] = &["timestamp", "payload.timestamp", "ts"];
