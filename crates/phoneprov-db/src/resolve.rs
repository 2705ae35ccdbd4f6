//! End-to-end config resolution.
//!
//! Pulls the variable tiers out of the store, renders the target content,
//! and normalizes the result. Provisioning, token redemption, and the
//! operator preview all go through the same pipeline so a device can never
//! receive a config the preview would not have shown.

use phoneprov_core::device::Device;
use phoneprov_core::mac::MacAddr;
use phoneprov_core::normalize::normalize;
use phoneprov_core::template::render;
use phoneprov_core::template_vars::validate_values;
use phoneprov_core::token::DownloadToken;
use phoneprov_core::vars::{self, TierSet, VarMap};
use tracing::debug;

use crate::{Database, DbError, DbResult};

fn finish(content: &str, tiers: &TierSet) -> String {
    normalize(&render(content, &tiers.resolve()))
}

impl Database {
    /// Assemble the variable tiers for a device render.
    pub fn device_tiers(
        &self,
        device: &Device,
        template_id: Option<i64>,
        overrides: VarMap,
    ) -> DbResult<TierSet> {
        let mut tiers = self.base_tiers(template_id, overrides)?;
        let pabx = match device.pabx_id {
            Some(id) => self.get_pabx(id)?,
            None => None,
        };
        tiers.device = vars::device_tier(device, pabx.as_ref());
        Ok(tiers)
    }

    /// Render a device's active config, or `None` without one.
    pub fn render_device_config(&self, device: &Device) -> DbResult<Option<String>> {
        let Some(active) = self.active_assignment(device.id)? else {
            return Ok(None);
        };
        let version = self.get_version(active.config_version_id)?.ok_or_else(|| {
            DbError::NotFound(format!("config version {}", active.config_version_id))
        })?;

        let tiers = self.device_tiers(device, None, VarMap::new())?;
        debug!(device_id = device.id, version_id = version.id, "Rendering active config");
        Ok(Some(finish(&version.content, &tiers)))
    }

    /// Operator-facing render without side effects.
    ///
    /// With a template id the template content is rendered and the supplied
    /// overrides are validated against its variable declarations; without
    /// one the device's active config is rendered with the overrides on top.
    pub fn render_preview(
        &self,
        device_id: i64,
        template_id: Option<i64>,
        overrides: VarMap,
    ) -> DbResult<String> {
        let device = self
            .get_device(device_id)?
            .ok_or_else(|| DbError::NotFound(format!("device {device_id}")))?;

        let content = match template_id {
            Some(template_id) => {
                let template = self
                    .get_template(template_id)?
                    .ok_or_else(|| DbError::NotFound(format!("template {template_id}")))?;
                let declarations = self.list_template_variables(template_id)?;
                validate_values(&declarations, &overrides)?;
                template.content
            }
            None => {
                let active = self.active_assignment(device.id)?.ok_or_else(|| {
                    DbError::NotFound(format!("device {device_id} has no active config"))
                })?;
                self.get_version(active.config_version_id)?
                    .ok_or_else(|| {
                        DbError::NotFound(format!("config version {}", active.config_version_id))
                    })?
                    .content
            }
        };

        let tiers = self.device_tiers(&device, template_id, overrides)?;
        Ok(finish(&content, &tiers))
    }

    /// Redeem a download token and render the content it grants.
    ///
    /// The token is consumed first; a device resolvable by the presented
    /// MAC is served its active config, anything else gets the token's
    /// bound version rendered with the bare MAC tier.
    pub fn redeem_and_render(
        &self,
        secret: &str,
        mac: Option<&MacAddr>,
    ) -> DbResult<(DownloadToken, String)> {
        let token = self.redeem_token(secret, mac)?;

        if let Some(mac) = mac
            && let Some(device) = self.find_active_device(mac)?
            && let Some(content) = self.render_device_config(&device)?
        {
            debug!(token_id = token.id, device_id = device.id, "Token served active config");
            return Ok((token, content));
        }

        let version = self.get_version(token.config_version_id)?.ok_or_else(|| {
            DbError::NotFound(format!("config version {}", token.config_version_id))
        })?;
        let mut tiers = self.base_tiers(None, VarMap::new())?;
        if let Some(mac) = mac {
            tiers.device = vars::mac_tier(mac, token.device_model.as_deref());
        }

        debug!(token_id = token.id, version_id = version.id, "Token served bound version");
        Ok((token, finish(&version.content, &tiers)))
    }

    fn base_tiers(&self, template_id: Option<i64>, overrides: VarMap) -> DbResult<TierSet> {
        let template_defaults = match template_id {
            Some(id) => {
                phoneprov_core::template_vars::defaults_tier(&self.list_template_variables(id)?)
            }
            None => VarMap::new(),
        };
        Ok(TierSet {
            global: self.global_tier()?,
            template_defaults,
            device: VarMap::new(),
            overrides,
        })
    }
}
