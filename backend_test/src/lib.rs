use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that any test database is dropped regardless of how the test
/// terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::model::store::MemoryStore`], [`mongodb::Database`],
/// [`crate::model::mongodb::MongoStore`], and
/// [`crate::model::mongodb::Coll<T>`]. The server runs over in-memory
/// storage unless the test asks for one of the MongoDB dependencies, in
/// which case it runs over a throwaway database and is ignored by default.
///
/// `#[backend_test(registered)]` registers the example voter's example key
/// before the test body runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let injected = match check_sig(item_fn.sig.clone()) {
        Ok(injected) => injected,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };
    let Injected {
        args: test_args,
        uses_mongodb,
    } = injected;

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Register the example key if needed.
    let maybe_register = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "registered" => quote! {
            let registry = &rocket_client
                .rocket()
                .state::<crate::model::store::Stores>()
                .unwrap()
                .registry;
            crate::model::store::KeyRegistry::register(
                registry.as_ref(),
                &crate::model::voter::VoterId::example(),
                &crate::model::key::PublicKeyDescriptor::example(),
            )
            .await
            .unwrap();
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `registered` or no argument")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Choose the storage backend.
    let (maybe_ignore, open_stores) = if uses_mongodb {
        (
            quote! { #[ignore = "requires a MongoDB replica set at $DB_URI"] },
            quote! {
                let db_uri = std::env::var("DB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
                let db_name = format!("test{}", rand::random::<u32>());
                let mongo_client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
                let server_store = crate::model::mongodb::MongoStore::open(mongo_client.clone(), &db_name)
                    .await
                    .unwrap();
                let test_store = crate::model::mongodb::MongoStore::open(mongo_client.clone(), &db_name)
                    .await
                    .unwrap();
                let stores = crate::model::store::Stores::shared(server_store);
                let mongo = Some((mongo_client.database(&db_name), test_store));
            },
        )
    } else {
        (
            quote! {},
            quote! {
                let stores = crate::model::store::Stores::shared(memory_store.clone());
                let mongo: Option<(mongodb::Database, crate::model::mongodb::MongoStore)> = None;
            },
        )
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #maybe_ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::model::store::MemoryStore,
                Option<(mongodb::Database, crate::model::mongodb::MongoStore)>,
            ) {
                let memory_store = crate::model::store::MemoryStore::default();
                #open_stores
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_stores(crate::Config::example(), stores),
                )
                .await
                .unwrap();

                #maybe_register

                (rocket_client, memory_store, mongo)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, memory_store, mongo) = outer_runtime.block_on(setup());
            let cleanup_db = mongo.as_ref().map(|(db, _)| db.clone());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let fixture_mutex = std::sync::Mutex::new((rocket_client, memory_store, mongo));
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let (rocket_client, memory_store, mongo) = fixture_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #[allow(unused_variables)]
                let (db, mongo_store) = match mongo {
                    Some((db, store)) => (Some(db), Some(store)),
                    None => (None, None),
                };

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(cleanup_db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// What a test asks to have injected, in parameter order.
struct Injected {
    args: Vec<TokenStream2>,
    uses_mongodb: bool,
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Injected, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_mongo_store = false;
    let mut uses_mongodb = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.get_ident() {
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "MemoryStore" {
                        args.push(quote! { memory_store.clone() });
                        continue;
                    } else if type_ident == "Database" {
                        uses_mongodb = true;
                        args.push(quote! { db.clone().unwrap() });
                        continue;
                    } else if type_ident == "MongoStore" {
                        if has_mongo_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `MongoStore`",
                            ));
                        }
                        has_mongo_store = true;
                        uses_mongodb = true;
                        args.push(quote! { mongo_store.unwrap() });
                        continue;
                    }
                } else if let Some(possible_collection) = type_path.path.segments.last() {
                    if possible_collection.ident == "Coll" {
                        if let PathArguments::AngleBracketed(generics) =
                            &possible_collection.arguments
                        {
                            if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                generics.args.first()
                            {
                                if let Some(type_ident) = type_path.path.get_ident() {
                                    uses_mongodb = true;
                                    args.push(quote! {
                                        crate::model::mongodb::Coll::<#type_ident>::from_db(db.as_ref().unwrap())
                                    });
                                    continue;
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: MemoryStore`, `db_ident: Database`, `store_ident: MongoStore` or `collection_ident: Coll<T>`",
        ));
    }

    Ok(Injected { args, uses_mongodb })
}
