//! Plain configuration values the sponsorship services read.

use crate::models::{DeliveryChannel, InvitationKind};

/// Per-kind invitation settings.
#[derive(Debug, Clone)]
pub struct InvitationSettings {
    pub token_expiry_days: i64,
    pub deep_link_base_url: String,
    /// Prepended to the token in the deep link path.
    pub deep_link_prefix: String,
    pub sms_template: String,
    pub sms_enabled: bool,
    pub whatsapp_enabled: bool,
}

impl InvitationSettings {
    pub fn dealer_defaults() -> Self {
        Self {
            token_expiry_days: 7,
            deep_link_base_url: "https://app.example.com/dealer-invitation".to_string(),
            deep_link_prefix: "DEALER-".to_string(),
            sms_template: "{sponsorName} invites you to become a dealer with {codeCount} \
                sponsorship codes. Accept within {expiryDays} days: {deepLink} \
                App: {playStoreLink}"
                .to_string(),
            sms_enabled: true,
            whatsapp_enabled: true,
        }
    }

    pub fn farmer_defaults() -> Self {
        Self {
            token_expiry_days: 7,
            deep_link_base_url: "https://app.example.com/farmer-invite".to_string(),
            deep_link_prefix: String::new(),
            sms_template: "{sponsorName} sent you {codeCount} free subscription code(s). \
                Accept within {expiryDays} days: {deepLink} App: {playStoreLink}"
                .to_string(),
            sms_enabled: true,
            whatsapp_enabled: true,
        }
    }

    pub fn deep_link(&self, token: &str) -> String {
        format!(
            "{}/{}{}",
            self.deep_link_base_url.trim_end_matches('/'),
            self.deep_link_prefix,
            token
        )
    }

    pub fn channel_enabled(&self, channel: DeliveryChannel) -> bool {
        match channel {
            DeliveryChannel::Sms => self.sms_enabled,
            DeliveryChannel::WhatsApp => self.whatsapp_enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SponsorshipSettings {
    pub dealer: InvitationSettings,
    pub farmer: InvitationSettings,
    pub code_prefix: String,
    pub code_validity_days: i64,
    pub max_codes_per_invitation: i32,
    pub play_store_link: String,
}

impl Default for SponsorshipSettings {
    fn default() -> Self {
        Self {
            dealer: InvitationSettings::dealer_defaults(),
            farmer: InvitationSettings::farmer_defaults(),
            code_prefix: "AGRI".to_string(),
            code_validity_days: 365,
            max_codes_per_invitation: 1000,
            play_store_link: "https://play.google.com/store/apps/details?id=com.example.sponsorship"
                .to_string(),
        }
    }
}

impl SponsorshipSettings {
    pub fn for_kind(&self, kind: InvitationKind) -> &InvitationSettings {
        match kind {
            InvitationKind::Dealer => &self.dealer,
            InvitationKind::Farmer => &self.farmer,
        }
    }
}

/// Values substituted into an invitation message template.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub sponsor_name: &'a str,
    pub token: &'a str,
    pub deep_link: &'a str,
    pub play_store_link: &'a str,
    pub expiry_days: i64,
    pub code_count: i32,
}

pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> String {
    template
        .replace("{sponsorName}", vars.sponsor_name)
        .replace("{token}", vars.token)
        .replace("{deepLink}", vars.deep_link)
        .replace("{playStoreLink}", vars.play_store_link)
        .replace("{expiryDays}", &vars.expiry_days.to_string())
        .replace("{codeCount}", &vars.code_count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_link_uses_kind_prefix() {
        let settings = SponsorshipSettings::default();
        assert_eq!(
            settings.dealer.deep_link("abc"),
            "https://app.example.com/dealer-invitation/DEALER-abc"
        );
        assert_eq!(
            settings.farmer.deep_link("abc"),
            "https://app.example.com/farmer-invite/abc"
        );
    }

    #[test]
    fn test_render_template() {
        let text = render_template(
            "{sponsorName}: {codeCount} codes, {expiryDays} days, {deepLink} ({token}) {playStoreLink}",
            &TemplateVars {
                sponsor_name: "Acme Seeds",
                token: "t0k",
                deep_link: "https://x/t0k",
                play_store_link: "https://play",
                expiry_days: 7,
                code_count: 3,
            },
        );
        assert_eq!(text, "Acme Seeds: 3 codes, 7 days, https://x/t0k (t0k) https://play");
    }

    #[test]
    fn test_channel_toggle() {
        let mut settings = InvitationSettings::farmer_defaults();
        settings.whatsapp_enabled = false;
        assert!(settings.channel_enabled(DeliveryChannel::Sms));
        assert!(!settings.channel_enabled(DeliveryChannel::WhatsApp));
    }
}
