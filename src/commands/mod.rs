// Declarative provisioning commands
pub mod declarative;
