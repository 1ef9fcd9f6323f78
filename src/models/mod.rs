// Data models shared by the API and the client

pub mod strain;
pub mod user;

pub use strain::{Comment, NewComment, NewStrain, Strain, StrainKind, StrainList};
pub use user::{NewUser, User};
