//! Credential commands: `get`, `set`, `delete`, `list`.

use credstore_core::{Config, SecretString};
use credstore_secrets::{CredentialAttributes, Credentials};

use super::{open_store, save_spec};

fn attributes(service: &str, user: Option<String>) -> CredentialAttributes {
    let attrs = CredentialAttributes::new(service);
    match user {
        Some(user) => attrs.with_user(user),
        None => attrs,
    }
}

/// Print the stored password.
pub fn get(config: &Config, service: &str, user: Option<String>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let attrs = attributes(service, user);

    match store.get_password(&attrs) {
        Some(password) => {
            println!("{}", password.expose_secret());
            Ok(())
        }
        None => anyhow::bail!("No credentials stored for '{}'", service),
    }
}

/// Store credentials, prompting for the password when not given.
pub fn set(
    config: &Config,
    service: &str,
    user: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => SecretString::from(p),
        None => {
            let prompt = format!("Password for '{service}': ");
            SecretString::from(
                rpassword::prompt_password(prompt)
                    .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))?,
            )
        }
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    let mut store = open_store(config)?;
    let attrs = attributes(service, user);
    store.set(
        &attrs,
        Some(Credentials::new(attrs.user_name.clone(), Some(password))),
    );
    let spec = save_spec(&store, config)?;
    store.save(&spec)?;

    println!("Credentials for '{}' stored.", service);
    Ok(())
}

/// Remove a service's credentials.
pub fn delete(config: &Config, service: &str) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let attrs = CredentialAttributes::new(service);
    if store.get(&attrs).is_none() {
        anyhow::bail!("No credentials stored for '{}'", service);
    }

    store.set(&attrs, None);
    let spec = save_spec(&store, config)?;
    store.save(&spec)?;

    println!("Credentials for '{}' deleted.", service);
    Ok(())
}

/// List services with their user names. Passwords are never printed.
pub fn list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    if store.is_empty() {
        println!("No credentials stored.");
        return Ok(());
    }

    println!("{:<32} {}", "SERVICE", "USER");
    println!("{}", "-".repeat(56));
    for service in store.services() {
        let user = store
            .get(&CredentialAttributes::new(service))
            .and_then(|c| c.user_name)
            .unwrap_or_else(|| "-".to_string());
        println!("{:<32} {}", service, user);
    }
    println!("\n{} credential(s) total.", store.len());
    Ok(())
}
