//! Test doubles for the collaborator traits.

use crate::gateway::{
    ChannelGateway, GatewayError, GatewayResult, NameResolver, Notifier, RoleMembership,
};
use async_trait::async_trait;
use gallows_types::{ChannelId, GameId, MemberId, VoterRole};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Role membership backed by a fixed map.
#[derive(Default)]
pub struct StaticMembership {
    pub roles: Mutex<HashMap<VoterRole, Vec<MemberId>>>,
    pub admins: Mutex<Vec<MemberId>>,
    pub deleted_members: Mutex<HashSet<MemberId>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_role(&self, role: VoterRole, members: Vec<MemberId>) {
        self.roles.lock().unwrap().insert(role, members);
    }

    pub fn drop_role(&self, role: &VoterRole) {
        self.roles.lock().unwrap().remove(role);
    }

    pub fn set_admins(&self, admins: Vec<MemberId>) {
        *self.admins.lock().unwrap() = admins;
    }

    pub fn delete_member(&self, member: MemberId) {
        self.deleted_members.lock().unwrap().insert(member);
    }
}

#[async_trait]
impl RoleMembership for StaticMembership {
    async fn members_of(&self, role: &VoterRole) -> GatewayResult<Vec<MemberId>> {
        self.roles
            .lock()
            .unwrap()
            .get(role)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(role.to_string()))
    }

    async fn role_exists(&self, role: &VoterRole) -> GatewayResult<bool> {
        Ok(self.roles.lock().unwrap().contains_key(role))
    }

    async fn member_exists(&self, member: &MemberId) -> GatewayResult<bool> {
        Ok(!self.deleted_members.lock().unwrap().contains(member))
    }

    async fn admins_of(&self, _game: &GameId) -> GatewayResult<Vec<MemberId>> {
        Ok(self.admins.lock().unwrap().clone())
    }
}

/// Channel gateway recording every grant/revoke.
#[derive(Default)]
pub struct RecordingGateway {
    pub granted: Mutex<Vec<(ChannelId, VoterRole)>>,
    pub revoked: Mutex<Vec<(ChannelId, VoterRole)>>,
    pub dead_channels: Mutex<HashSet<ChannelId>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill_channel(&self, channel: ChannelId) {
        self.dead_channels.lock().unwrap().insert(channel);
    }

    fn check_alive(&self, channel: &ChannelId) -> GatewayResult<()> {
        if self.dead_channels.lock().unwrap().contains(channel) {
            Err(GatewayError::NotFound(channel.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChannelGateway for RecordingGateway {
    async fn grant_posting(&self, channel: &ChannelId, role: &VoterRole) -> GatewayResult<()> {
        self.check_alive(channel)?;
        self.granted
            .lock()
            .unwrap()
            .push((channel.clone(), role.clone()));
        Ok(())
    }

    async fn revoke_posting(&self, channel: &ChannelId, role: &VoterRole) -> GatewayResult<()> {
        self.check_alive(channel)?;
        self.revoked
            .lock()
            .unwrap()
            .push((channel.clone(), role.clone()));
        Ok(())
    }

    async fn channel_exists(&self, channel: &ChannelId) -> GatewayResult<bool> {
        Ok(!self.dead_channels.lock().unwrap().contains(channel))
    }
}

/// Notifier recording every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub channel_messages: Mutex<Vec<(ChannelId, String)>>,
    pub direct_messages: Mutex<Vec<(MemberId, String)>>,
    pub dead_channels: Mutex<HashSet<ChannelId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill_channel(&self, channel: ChannelId) {
        self.dead_channels.lock().unwrap().insert(channel);
    }

    pub fn channel_messages_for(&self, channel: &ChannelId) -> Vec<String> {
        self.channel_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_channel(&self, channel: &ChannelId, message: &str) -> GatewayResult<()> {
        if self.dead_channels.lock().unwrap().contains(channel) {
            return Err(GatewayError::NotFound(channel.to_string()));
        }
        self.channel_messages
            .lock()
            .unwrap()
            .push((channel.clone(), message.to_string()));
        Ok(())
    }

    async fn send_direct(&self, member: &MemberId, message: &str) -> GatewayResult<()> {
        self.direct_messages
            .lock()
            .unwrap()
            .push((member.clone(), message.to_string()));
        Ok(())
    }
}

/// Name resolver echoing the raw id.
#[derive(Default)]
pub struct PlainNames;

#[async_trait]
impl NameResolver for PlainNames {
    async fn display_name(&self, member: &MemberId) -> String {
        member.to_string()
    }
}
