// Client-side view of the catalog and the user's cabinet

use super::api::{ClientError, Result};
use super::session::SessionManager;
use crate::models::{NewStrain, NewUser, Strain, StrainKind, User};

pub const PASSWORD_MISMATCH: &str = "\"Password\" & \"Verify Password\" fields must match";
pub const ALREADY_IN_CABINET: &str = "This strain is already in your cabinet";

/// Cached catalog state for one client
///
/// Owns the session. Checks that can be made locally (password
/// confirmation, duplicate cabinet entries, strain type) are made before
/// any request is sent.
pub struct Catalog {
    session: SessionManager,
    strains: Vec<Strain>,
    cabinet: Vec<Strain>,
    current: Option<Strain>,
}

impl Catalog {
    pub fn new(session: SessionManager) -> Self {
        Self {
            session,
            strains: Vec::new(),
            cabinet: Vec::new(),
            current: None,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Every strain, as of the last `refresh_strains`
    pub fn strains(&self) -> &[Strain] {
        &self.strains
    }

    /// The user's cabinet, as of the last `refresh_cabinet`
    pub fn cabinet(&self) -> &[Strain] {
        &self.cabinet
    }

    pub fn current_strain(&self) -> Option<&Strain> {
        self.current.as_ref()
    }

    async fn token(&self) -> Result<String> {
        self.session.token().await.ok_or(ClientError::NotLoggedIn)
    }

    // === Account ===

    /// Create an account and log straight into it
    pub async fn register(
        &mut self,
        user_name: &str,
        password: &str,
        password_check: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        if password != password_check {
            return Err(ClientError::Rejected(PASSWORD_MISMATCH.to_string()));
        }

        let new_user = NewUser {
            user_name: user_name.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        let user = self.session.api().create_user(&new_user).await?;
        tracing::info!("Account created for {}", user.user_name);

        self.login(user_name, password).await?;
        Ok(user)
    }

    /// Log in, then load the catalog and the cabinet
    pub async fn login(&mut self, user_name: &str, password: &str) -> Result<()> {
        let token = self.session.login(user_name, password).await?;
        self.current = None;
        self.strains.clear();
        self.cabinet.clear();

        let api = self.session.api();
        let (strains, cabinet) =
            futures::try_join!(api.list_strains(), api.user_strains(&token))?;
        self.strains = strains;
        self.cabinet = cabinet;
        Ok(())
    }

    /// End the session and forget everything cached
    pub async fn logout(&mut self) {
        self.session.logout().await;
        self.strains.clear();
        self.cabinet.clear();
        self.current = None;
    }

    // === Catalog ===

    pub async fn refresh_strains(&mut self) -> Result<&[Strain]> {
        self.strains = self.session.api().list_strains().await?;
        Ok(&self.strains)
    }

    /// Add a strain to the shared catalog
    pub async fn create_strain(
        &mut self,
        name: &str,
        kind: &str,
        flavor: &str,
        description: &str,
    ) -> Result<Strain> {
        if StrainKind::parse(kind).is_none() {
            return Err(ClientError::Rejected(
                StrainKind::INVALID_MESSAGE.to_string(),
            ));
        }

        let token = self.token().await?;
        let new = NewStrain {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            flavor: flavor.to_string(),
        };
        let strain = self.session.api().create_strain(&token, &new).await?;
        self.refresh_strains().await?;
        Ok(strain)
    }

    // === Cabinet ===

    pub async fn refresh_cabinet(&mut self) -> Result<&[Strain]> {
        let token = self.token().await?;
        self.cabinet = self.session.api().user_strains(&token).await?;
        Ok(&self.cabinet)
    }

    pub async fn add_to_cabinet(&mut self, strain_id: &str) -> Result<()> {
        if self.cabinet.iter().any(|s| s.id == strain_id) {
            return Err(ClientError::Rejected(ALREADY_IN_CABINET.to_string()));
        }

        let token = self.token().await?;
        self.session.api().add_to_cabinet(&token, strain_id).await?;
        self.refresh_cabinet().await?;
        Ok(())
    }

    pub async fn remove_from_cabinet(&mut self, strain_id: &str) -> Result<()> {
        let token = self.token().await?;
        self.session
            .api()
            .remove_from_cabinet(&token, strain_id)
            .await?;

        if self.current.as_ref().is_some_and(|s| s.id == strain_id) {
            self.current = None;
        }
        self.refresh_cabinet().await?;
        Ok(())
    }

    /// Make a cabinet strain the current one
    pub fn select_strain(&mut self, strain_id: &str) -> Result<&Strain> {
        let strain = self
            .cabinet
            .iter()
            .find(|s| s.id == strain_id)
            .cloned()
            .ok_or_else(|| ClientError::Rejected("That strain is not in your cabinet".to_string()))?;
        Ok(self.current.insert(strain))
    }

    // === Comments ===

    pub async fn add_comment(&mut self, content: &str) -> Result<&Strain> {
        let strain_id = self.selected_id()?;
        let token = self.token().await?;
        self.session
            .api()
            .add_comment(&token, &strain_id, content)
            .await?;
        self.reload_current().await
    }

    /// Comments can only be removed by their author
    pub async fn can_remove_comment(&self, comment_id: &str) -> bool {
        let Some(comment) = self.current.as_ref().and_then(|s| s.comment(comment_id)) else {
            return false;
        };
        self.session.current_user().await.as_deref() == Some(comment.author.as_str())
    }

    pub async fn remove_comment(&mut self, comment_id: &str) -> Result<&Strain> {
        let strain_id = self.selected_id()?;
        if !self.can_remove_comment(comment_id).await {
            return Err(ClientError::Rejected(
                "You can only remove your own comments".to_string(),
            ));
        }

        let token = self.token().await?;
        self.session
            .api()
            .remove_comment(&token, &strain_id, comment_id)
            .await?;
        self.reload_current().await
    }

    fn selected_id(&self) -> Result<String> {
        self.current
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or_else(|| ClientError::Rejected("No strain selected".to_string()))
    }

    /// Reload the cabinet and pick the current strain back out of it by name
    async fn reload_current(&mut self) -> Result<&Strain> {
        let name = self.current.as_ref().map(|s| s.name.clone());
        self.refresh_cabinet().await?;

        self.current = name.and_then(|name| self.cabinet.iter().find(|s| s.name == name).cloned());
        self.current
            .as_ref()
            .ok_or_else(|| ClientError::Rejected("That strain is not in your cabinet".to_string()))
    }
}
