use std::path::Path;

use crate::lifecycle::LifecycleReporter;
use crate::service::ManagedService;

/// Runs the orderly teardown of the managed service.
///
/// Must be called once, after the stop notification was sent. The service's
/// own `shutdown` blocks until its work has drained.
pub(crate) fn shutdown<S>(service: &mut S, data_dir: &Path, reporter: &dyn LifecycleReporter)
where
    S: ManagedService,
{
    reporter.shutting_down();
    service.shutdown(data_dir);
    reporter.goodbye();
}
