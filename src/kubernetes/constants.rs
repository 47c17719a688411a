pub const APP_KUBERNETES_IO_COMPONENT_KEY: &str = "app.kubernetes.io/component";

pub const APP_KUBERNETES_IO_INSTANCE_KEY: &str = "app.kubernetes.io/instance";

pub const APP_KUBERNETES_IO_MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";
pub const APP_KUBERNETES_IO_MANAGED_BY_VALUE: &str = "ssh-access-operator";

pub const APP_KUBERNETES_IO_NAME_KEY: &str = "app.kubernetes.io/name";
pub const APP_KUBERNETES_IO_NAME_VALUE: &str = "ssh-access";

pub const SSH_AGABANI_CO_UK_AUTHORIZED_KEYS_KEY: &str = "ssh.agabani.co.uk/authorized-keys";

pub const SSH_AGABANI_CO_UK_OWNED_BY_KEY: &str = "ssh.agabani.co.uk/owned-by";
