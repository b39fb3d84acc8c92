mod admin;
mod callbacks;
mod donations;
mod helpers;
mod mocks;
