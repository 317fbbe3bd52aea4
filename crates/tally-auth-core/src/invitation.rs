//! Team management: invitations, acceptance, role changes and removal

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_db::{
    AccountRepository, CreateInvitation, CreateTeamMember, Stores, TeamInvitationRepository,
    TeamInvitationRow, TeamMemberRepository, TeamMemberRow,
};
use tally_types::{AccountId, InvitationId, MemberRole, TeamMemberId};

use crate::crypto::{generate_invitation_token, hash_token};
use crate::{AuthConfig, AuthError};

/// What an invitee needs to redeem an invitation
#[derive(Debug, Clone)]
pub struct InvitationNotice {
    pub invitation_id: InvitationId,
    pub email: String,
    /// Raw secret. Never logged, never stored.
    pub token: String,
    pub organization_name: String,
    pub role: MemberRole,
    pub expires_at: DateTime<Utc>,
}

/// Delivery channel for invitations (email in production)
#[async_trait]
pub trait InvitationSender: Send + Sync {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), AuthError>;
}

/// Sender that only logs that an invitation was issued
#[derive(Debug, Default, Clone)]
pub struct TracingInvitationSender;

#[async_trait]
impl InvitationSender for TracingInvitationSender {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), AuthError> {
        tracing::info!(
            invitation_id = %notice.invitation_id,
            email = %notice.email,
            role = %notice.role,
            expires_at = %notice.expires_at,
            "Team invitation issued"
        );
        Ok(())
    }
}

/// A newly created invitation and its raw token
#[derive(Debug, Clone)]
pub struct CreatedInvitation {
    pub invitation: TeamInvitationRow,
    pub token: String,
}

/// A membership joined with the member's account details
#[derive(Debug, Clone)]
pub struct TeamMemberDetails {
    pub membership: TeamMemberRow,
    pub email: String,
    pub name: String,
}

/// Team management service
#[derive(Clone)]
pub struct TeamService {
    accounts: Arc<dyn AccountRepository>,
    members: Arc<dyn TeamMemberRepository>,
    invitations: Arc<dyn TeamInvitationRepository>,
    sender: Arc<dyn InvitationSender>,
    invitation_ttl: chrono::Duration,
}

impl TeamService {
    /// Create a new team service
    pub fn new(
        config: &AuthConfig,
        stores: &Stores,
        sender: Arc<dyn InvitationSender>,
    ) -> Result<Self, AuthError> {
        let invitation_ttl = chrono::Duration::from_std(config.invitation_ttl)
            .map_err(|e| AuthError::Configuration(format!("invitation TTL out of range: {e}")))?;

        Ok(Self {
            accounts: stores.accounts.clone(),
            members: stores.members.clone(),
            invitations: stores.invitations.clone(),
            sender,
            invitation_ttl,
        })
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    /// Invite `email` into `owner`'s team with `role`
    pub async fn invite_member(
        &self,
        owner: AccountId,
        inviter: AccountId,
        email: &str,
        role: MemberRole,
    ) -> Result<CreatedInvitation, AuthError> {
        let email = normalize_email(email)?;

        if !role.is_assignable() {
            return Err(AuthError::Forbidden(
                "cannot invite a member as owner".to_string(),
            ));
        }

        if let Some(existing) = self.accounts.find_by_email(&email).await? {
            if existing.account_id() == owner {
                return Err(AuthError::Validation(
                    "cannot invite the organization owner".to_string(),
                ));
            }
            if self
                .members
                .find_by_owner_and_member(owner, existing.account_id())
                .await?
                .is_some()
            {
                return Err(AuthError::Conflict(
                    "user is already a member of this team".to_string(),
                ));
            }
        }

        let now = Utc::now();
        if self
            .invitations
            .find_pending_by_owner_and_email(owner, &email, now)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "an invitation is already pending for this email".to_string(),
            ));
        }

        let token = generate_invitation_token();
        let invitation = self
            .invitations
            .create(CreateInvitation {
                id: InvitationId::new(),
                owner_id: owner,
                email: email.clone(),
                role,
                token_hash: hash_token(&token),
                invited_by: inviter,
                created_at: now,
                expires_at: now + self.invitation_ttl,
            })
            .await?;

        tracing::info!(
            owner_id = %owner,
            invitation_id = %invitation.id,
            role = %role,
            "Created team invitation"
        );

        let organization_name = match self.accounts.find_by_id(owner).await {
            Ok(Some(account)) => account.display_name().to_string(),
            _ => String::new(),
        };
        let notice = InvitationNotice {
            invitation_id: invitation.invitation_id(),
            email,
            token: token.clone(),
            organization_name,
            role,
            expires_at: invitation.expires_at,
        };
        if let Err(e) = self.sender.send_invitation(&notice).await {
            tracing::warn!(
                invitation_id = %invitation.id,
                error = %e,
                "Failed to deliver team invitation"
            );
        }

        Ok(CreatedInvitation { invitation, token })
    }

    /// Redeem an invitation token for `account`.
    ///
    /// The invitation is claimed before the membership is written, so a token
    /// is redeemed at most once even when accepted concurrently. The claim is
    /// released again if the membership cannot be written.
    pub async fn accept_invitation(
        &self,
        token: &str,
        account: AccountId,
    ) -> Result<TeamMemberRow, AuthError> {
        let invitation = self
            .invitations
            .find_by_token_hash(&hash_token(token.trim()))
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        let now = Utc::now();
        if invitation.is_accepted() {
            return Err(AuthError::Conflict(
                "invitation has already been accepted".to_string(),
            ));
        }
        if invitation.is_expired_at(now) {
            return Err(AuthError::InvitationExpired);
        }

        let role = invitation
            .role()
            .map_err(|e| AuthError::Internal(format!("stored invitation role: {e}")))?;

        let accepting = self
            .accounts
            .find_by_id(account)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !accepting.email.eq_ignore_ascii_case(&invitation.email) {
            return Err(AuthError::EmailMismatch);
        }

        let owner = invitation.owner_id();
        if owner == account {
            return Err(AuthError::Validation(
                "cannot join your own organization".to_string(),
            ));
        }

        if self
            .members
            .find_by_owner_and_member(owner, account)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "already a member of this team".to_string(),
            ));
        }

        if !self.members.find_external_memberships(account).await?.is_empty() {
            return Err(AuthError::Conflict(
                "already a member of another organization".to_string(),
            ));
        }

        if !self
            .invitations
            .mark_accepted(invitation.invitation_id(), now)
            .await?
        {
            return Err(AuthError::Conflict(
                "invitation has already been accepted".to_string(),
            ));
        }

        let created = self
            .members
            .create(CreateTeamMember {
                owner_id: owner,
                member_id: account,
                role,
                invited_by: AccountId(invitation.invited_by),
                invited_at: invitation.created_at,
                accepted_at: Some(now),
            })
            .await;
        let membership = match created {
            Ok(membership) => membership,
            Err(e) => {
                if let Err(release) = self
                    .invitations
                    .unmark_accepted(invitation.invitation_id())
                    .await
                {
                    tracing::error!(
                        invitation_id = %invitation.id,
                        error = %release,
                        "Failed to release invitation claim"
                    );
                }
                tracing::warn!(
                    invitation_id = %invitation.id,
                    member_id = %account,
                    error = %e,
                    "Membership write failed, invitation reopened"
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            owner_id = %owner,
            member_id = %account,
            role = %role,
            "Team invitation accepted"
        );

        Ok(membership)
    }

    /// Unaccepted, unexpired invitations of `owner`'s team
    pub async fn list_pending_invitations(
        &self,
        owner: AccountId,
    ) -> Result<Vec<TeamInvitationRow>, AuthError> {
        Ok(self
            .invitations
            .find_pending_by_owner(owner, Utc::now())
            .await?)
    }

    /// Withdraw an invitation of `owner`'s team
    pub async fn cancel_invitation(
        &self,
        owner: AccountId,
        invitation_id: InvitationId,
    ) -> Result<(), AuthError> {
        let invitation = self
            .invitations
            .find_by_id(invitation_id)
            .await?
            .filter(|i| i.owner_id() == owner)
            .ok_or(AuthError::InvitationNotFound)?;

        // An accepted invitation's seat now belongs to the membership.
        if invitation.is_accepted() {
            return Err(AuthError::Conflict(
                "invitation has already been accepted".to_string(),
            ));
        }

        self.invitations.delete(invitation.invitation_id()).await?;
        tracing::info!(
            owner_id = %owner,
            invitation_id = %invitation_id,
            "Cancelled team invitation"
        );
        Ok(())
    }

    /// Delete unaccepted invitations past their expiry, returning them so
    /// their seats can be released
    pub async fn purge_expired_invitations(&self) -> Result<Vec<TeamInvitationRow>, AuthError> {
        Ok(self.invitations.delete_expired(Utc::now()).await?)
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Members of `owner`'s team with their account details
    pub async fn list_members(&self, owner: AccountId) -> Result<Vec<TeamMemberDetails>, AuthError> {
        let rows = self.members.find_by_owner(owner).await?;
        let mut members = Vec::with_capacity(rows.len());
        for membership in rows {
            let (email, name) = match self.accounts.find_by_id(membership.member_id()).await? {
                Some(account) => (account.email.clone(), account.display_name().to_string()),
                None => (String::new(), String::new()),
            };
            members.push(TeamMemberDetails {
                membership,
                email,
                name,
            });
        }
        Ok(members)
    }

    /// Change a member's role. Owner is neither a valid target nor a valid
    /// new role.
    pub async fn update_role(
        &self,
        owner: AccountId,
        member_id: TeamMemberId,
        role: MemberRole,
    ) -> Result<TeamMemberRow, AuthError> {
        if !role.is_assignable() {
            return Err(AuthError::Forbidden(
                "cannot promote a member to owner".to_string(),
            ));
        }

        let mut membership = self.owned_membership(owner, member_id).await?;
        if !matches!(membership.role(), Ok(current) if current.is_assignable()) {
            return Err(AuthError::Forbidden(
                "cannot change the owner's role".to_string(),
            ));
        }

        self.members.update_role(member_id, role).await?;
        membership.role = role.as_str().to_string();

        tracing::info!(
            owner_id = %owner,
            membership_id = %member_id,
            role = %role,
            "Updated team member role"
        );

        Ok(membership)
    }

    /// Remove a member from `owner`'s team
    pub async fn remove_member(
        &self,
        owner: AccountId,
        member_id: TeamMemberId,
    ) -> Result<TeamMemberRow, AuthError> {
        let membership = self.owned_membership(owner, member_id).await?;
        if !matches!(membership.role(), Ok(current) if current.is_assignable()) {
            return Err(AuthError::Forbidden("cannot remove the owner".to_string()));
        }

        self.members.delete(member_id).await?;
        tracing::info!(owner_id = %owner, membership_id = %member_id, "Removed team member");

        Ok(membership)
    }

    async fn owned_membership(
        &self,
        owner: AccountId,
        member_id: TeamMemberId,
    ) -> Result<TeamMemberRow, AuthError> {
        self.members
            .find_by_id(member_id)
            .await?
            .filter(|m| m.owner_id() == owner)
            .ok_or(AuthError::MemberNotFound)
    }
}

impl std::fmt::Debug for TeamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamService")
            .field("invitation_ttl", &self.invitation_ttl)
            .finish_non_exhaustive()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AuthError::Validation("invalid email address".to_string()))
    }
}
