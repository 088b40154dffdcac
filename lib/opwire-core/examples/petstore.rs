#![allow(dead_code)]

use http::uri::Scheme;
use opwire_core::{ApiClient, Input, Specification, operations};
use serde::Deserialize;

operations! {
    trait DogCeo {
        fn list_breeds = "listBreeds";
        fn breed_images = "breedImages";
    }
}

const SPECIFICATION: &str = r#"{
    "swagger": "2.0",
    "host": "dog.ceo",
    "basePath": "/api",
    "paths": {
        "/breeds/list": {
            "get": { "operationId": "listBreeds" }
        },
        "/breed/{breed}/images": {
            "get": {
                "operationId": "breedImages",
                "parameters": [{ "name": "breed", "in": "path", "required": true }]
            }
        }
    }
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().pretty().init();

    let specification: Specification = SPECIFICATION.parse()?;
    let client = ApiClient::builder()
        .with_scheme(Scheme::HTTP)
        .build(specification)?;

    for operation in client.operations() {
        println!("{} {} {}", operation.id(), operation.method(), operation.path());
    }

    let breeds = client.list_breeds(Input::new()).await?.as_json::<BreedsList>()?;
    println!("{} breeds", breeds.message.len());

    // served from the cache
    let again = client.list_breeds(Input::new()).await?;
    println!("second call from {}", again.source());

    let images = client
        .breed_images(Input::new().with("breed", "hound"))
        .await?
        .as_json::<BreedImages>()?;
    println!("{} hound images", images.message.len());

    if let Err(error) = client.breed_images(Input::new()).await {
        for record in error.errors() {
            println!("{record}");
        }
    }

    Ok(())
}

type BreedsList = DogCeoResult<Vec<String>>;
type BreedImages = DogCeoResult<Vec<String>>;

#[derive(Debug, Deserialize)]
struct DogCeoResult<T> {
    message: T,
    status: String,
}
