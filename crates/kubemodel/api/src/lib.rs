pub mod model;
pub mod name;

pub mod consts {
    pub const ANNOTATION_INJECT: &str = "models.main-currents.news/inject";
    pub const ANNOTATION_MOUNT_PATH: &str = "models.main-currents.news/mount-path";
    pub const ANNOTATION_READ_ONLY: &str = "models.main-currents.news/read-only";
    pub const ANNOTATION_CONTAINER: &str = "models.main-currents.news/container";
    pub const ANNOTATION_INJECT_ENV: &str = "models.main-currents.news/inject-env";

    /// Marks a workload that has already been processed by the model injector.
    pub const LABEL_INJECTED: &str = "models.main-currents.news/injected";

    pub const LABEL_NAME: &str = "app.kubernetes.io/name";
    pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
    pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

    pub const MANAGED_BY: &str = "model-operator";
}
