mod client;

pub use client::{
    ApiErrorClass, DiskClient, DiskError, DiskInfo, Resource, ResourceList, ResourceType,
    TransferLink, ROOT_PATH,
};
