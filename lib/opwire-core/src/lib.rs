//! # Opwire Core
//!
//! Call the operations of a Swagger 2.0 style API description by id, without
//! generating code.
//!
//! A [`Specification`] is loaded from JSON (or YAML with the `yaml` feature),
//! then an [`ApiClient`] exposes each of its operations:
//!
//! - input values are bound to the declared parameters (path, query, header,
//!   body, form data, file), missing required values are reported before
//!   anything is sent;
//! - successful `GET` responses are cached by URL, [`ApiClient::fresh`]
//!   bypasses the cache for the next call;
//! - when a [`MessageChannel`] is attached (a WebSocket with the `websocket`
//!   feature), calls are sent over it and matched with their reply by
//!   correlation id, otherwise they go over HTTP;
//! - every failure is a [`CallError`] carrying a list of `{ message, path }`
//!   [`ErrorRecord`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opwire_core::{ApiClient, Input, Specification};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec: Specification = r#"{
//!     "basePath": "/api",
//!     "paths": {
//!         "/pets": {
//!             "get": {
//!                 "operationId": "listPets",
//!                 "parameters": [{ "name": "limit", "in": "query" }]
//!             },
//!             "post": {
//!                 "operationId": "addPet",
//!                 "parameters": [{ "name": "pet", "in": "body", "required": true }]
//!             }
//!         }
//!     }
//! }"#
//! .parse()?;
//!
//! let client = ApiClient::builder().with_host("localhost:3000").build(spec)?;
//!
//! let pets = client.call("listPets").with_param("limit", 10).await?;
//! println!("{}", pets.text());
//!
//! match client.call("addPet").await {
//!     Ok(_) => unreachable!("pet is required"),
//!     Err(error) => {
//!         for record in error.errors() {
//!             println!("{record}"); // Missing input: pet (/pet)
//!         }
//!     }
//! }
//!
//! client
//!     .call("addPet")
//!     .with_input(Input::new().with("pet", json!({ "name": "kitty" })))
//!     .on_complete(|outcome| println!("added: {}", outcome.is_ok()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Named operations
//!
//! The [`operations!`] macro declares a trait with one method per operation,
//! implemented for [`ApiClient`].
//!
//! ## Features
//!
//! - `yaml`: [`Specification::from_yaml_str`]
//! - `websocket`: [`WebSocketChannel`]

mod client;
pub mod spec;

pub use self::client::{
    ApiCall, ApiClient, ApiClientBuilder, ApiClientError, CallError, CallResponse, ChannelError,
    ChannelRequest, ErrorRecord, Input, MessageChannel, PreparedRequest, RejectedRequest,
    RequestBody, ResponseBody, ResponseSource,
};
#[cfg(feature = "websocket")]
pub use self::client::WebSocketChannel;
pub use self::spec::{
    OperationDef, ParameterDef, ParameterLocation, PathSegment, PathTemplate, Specification,
};

/// Declares a trait with one named method per operation id, implemented for
/// [`ApiClient`].
///
/// Each method takes the call [`Input`] and returns the [`ApiCall`], ready to
/// be awaited or further configured.
///
/// # Example
///
/// ```rust,no_run
/// use opwire_core::{ApiClient, Input, operations};
///
/// operations! {
///     /// The petstore operations.
///     pub trait PetStore {
///         fn list_pets = "listPets";
///         /// Fetches a single pet.
///         fn show_pet_by_id = "showPetById";
///     }
/// }
///
/// # async fn example(client: ApiClient) -> Result<(), Box<dyn std::error::Error>> {
/// let pet = client.show_pet_by_id(Input::new().with("petId", 42)).await?;
/// let pets = client.list_pets(Input::new()).fresh().await?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! operations {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident = $operation_id:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name {
            $(
                $(#[$method_meta])*
                fn $method(&self, input: $crate::Input) -> $crate::ApiCall;
            )*
        }

        impl $name for $crate::ApiClient {
            $(
                fn $method(&self, input: $crate::Input) -> $crate::ApiCall {
                    self.call($operation_id).with_input(input)
                }
            )*
        }
    };
}
