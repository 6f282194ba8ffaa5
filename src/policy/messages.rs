use serde::{Deserialize, Serialize};

/// 用户可见的错误消息目录（法语）
///
/// 字段名在线上使用 camelCase，与决策服务共享同一份键名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageCatalog {
    pub vpn: String,
    pub threat: String,
    pub location_change: String,
    pub new_device: String,
    pub account_locked: String,
    pub ip_blocked: String,
    pub device_blocked: String,
}

/// 消息键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKey {
    Vpn,
    Threat,
    LocationChange,
    NewDevice,
    AccountLocked,
    IpBlocked,
    DeviceBlocked,
}

impl MessageKey {
    pub const ALL: [MessageKey; 7] = [
        MessageKey::Vpn,
        MessageKey::Threat,
        MessageKey::LocationChange,
        MessageKey::NewDevice,
        MessageKey::AccountLocked,
        MessageKey::IpBlocked,
        MessageKey::DeviceBlocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::Vpn => "vpn",
            MessageKey::Threat => "threat",
            MessageKey::LocationChange => "locationChange",
            MessageKey::NewDevice => "newDevice",
            MessageKey::AccountLocked => "accountLocked",
            MessageKey::IpBlocked => "ipBlocked",
            MessageKey::DeviceBlocked => "deviceBlocked",
        }
    }
}

impl MessageCatalog {
    pub fn get(&self, key: MessageKey) -> &str {
        match key {
            MessageKey::Vpn => &self.vpn,
            MessageKey::Threat => &self.threat,
            MessageKey::LocationChange => &self.location_change,
            MessageKey::NewDevice => &self.new_device,
            MessageKey::AccountLocked => &self.account_locked,
            MessageKey::IpBlocked => &self.ip_blocked,
            MessageKey::DeviceBlocked => &self.device_blocked,
        }
    }

    /// 返回第一个为空的消息键
    pub fn first_empty(&self) -> Option<MessageKey> {
        MessageKey::ALL
            .into_iter()
            .find(|key| self.get(*key).trim().is_empty())
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            vpn: "Veuillez désactiver votre VPN pour utiliser la plateforme. Pour des raisons de sécurité, les VPN ne sont pas autorisés, même légitimes.".to_string(),
            threat: "Votre adresse IP a été identifiée comme suspecte. Veuillez réessayer plus tard.".to_string(),
            location_change: "Changement de localisation détecté. Votre compte a été verrouillé pendant 24 heures. Veuillez vérifier votre email.".to_string(),
            new_device: "Nouvel appareil détecté. Votre compte a été verrouillé pendant 24 heures. Veuillez vérifier votre email.".to_string(),
            account_locked: "Votre compte est actuellement verrouillé. Veuillez réessayer dans quelques heures.".to_string(),
            ip_blocked: "Votre adresse IP a été bloquée en raison d'une activité suspecte.".to_string(),
            device_blocked: "Votre appareil a été bloqué en raison d'une activité suspecte.".to_string(),
        }
    }
}
