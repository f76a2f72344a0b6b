//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use serde::Serialize;
use groupchat_collab::{HostData, PlaylistData, SessionData};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    id: String,
    display_name: String,
    email: Option<String>,
    url: String,
    phone_number: Option<String>,
    active_playlist_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    host: Host,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    id: String,
    title: String,
    key: String,
    url: String,
    owner_id: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Host> for HostData {
    fn to_serialized(&self) -> Host {
        // Tokens never leave the server
        Host {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            url: self.url.clone(),
            phone_number: self.phone_number.clone(),
            active_playlist_id: self.active_playlist_id.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            host: self.host.to_serialized(),
        }
    }
}

impl ToSerialized<Playlist> for PlaylistData {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            id: self.id.clone(),
            title: self.title.clone(),
            key: self.key.clone(),
            url: self.url.clone(),
            owner_id: self.owner_id.clone(),
        }
    }
}
