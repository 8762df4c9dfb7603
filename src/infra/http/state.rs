use std::sync::Arc;

use crate::application::posts::PostService;
use crate::application::settings::SettingsService;
use crate::application::users::UserService;
use crate::auth::SessionAuthenticator;
use crate::cache::PolicyRegistry;

#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub users: Arc<UserService>,
    pub sessions: Arc<SessionAuthenticator>,
    pub registry: Arc<PolicyRegistry>,
    pub settings: Arc<SettingsService>,
    pub trust_forwarded_for: bool,
}
