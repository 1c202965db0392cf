use std::cmp::Ordering;
use std::env;
use std::process::Command;

// CPU features that change the kernel's preferred step width
#[derive(PartialEq, Eq, Debug)]
struct CpuFeature {
    name: &'static str,
    detected: bool,
}

impl CpuFeature {
    // Lowest number == highest priority
    fn priority(&self) -> usize {
        match self.name {
            "sve" => 0,
            "avx512f" => 1,
            "avx2" => 2,
            "neon" | "asimd" => 3,
            "sse4_1" => 4,
            _ => usize::MAX,
        }
    }

    fn features() -> Vec<CpuFeature> {
        ["sve", "avx512f", "avx2", "asimd", "neon", "sse4_1"]
            .into_iter()
            .map(|name| CpuFeature {
                name,
                detected: false,
            })
            .collect()
    }
}

impl Ord for CpuFeature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for CpuFeature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

trait CpuFeatureDetector {
    fn detect_features(&self, features: &mut [CpuFeature]);
    fn is_applicable(&self) -> bool;
}

struct LinuxDetector;
impl CpuFeatureDetector for LinuxDetector {
    fn detect_features(&self, features: &mut [CpuFeature]) {
        if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
            // Flags are whitespace separated; "sve" must not match "sve2" alone.
            let flags: Vec<String> = cpuinfo
                .lines()
                .filter(|line| line.starts_with("flags") || line.starts_with("Features"))
                .flat_map(|line| line.split_whitespace().map(str::to_lowercase))
                .collect();

            for feature in features.iter_mut() {
                feature.detected = flags.iter().any(|flag| flag == feature.name);
            }
        }
    }

    fn is_applicable(&self) -> bool {
        cfg!(target_os = "linux")
    }
}

struct MacOSDetector;
impl CpuFeatureDetector for MacOSDetector {
    fn detect_features(&self, features: &mut [CpuFeature]) {
        let output = Command::new("sysctl").args(["-a"]).output();

        if let Ok(output) = output {
            let contents = String::from_utf8_lossy(&output.stdout).to_lowercase();

            for feature in features.iter_mut() {
                feature.detected = match feature.name {
                    "avx512f" => contents.contains("hw.optional.avx512f: 1"),
                    "avx2" => contents.contains("hw.optional.avx2_0: 1"),
                    "sse4_1" => contents.contains("hw.optional.sse4_1: 1"),
                    "neon" => contents.contains("hw.optional.neon: 1"),
                    "sve" => contents.contains("hw.optional.arm.feat_sve: 1"),
                    _ => false,
                };
            }
        }
    }

    fn is_applicable(&self) -> bool {
        cfg!(target_os = "macos")
    }
}

struct PlatformDetector;
impl PlatformDetector {
    fn cpu_features_detectors() -> Vec<Box<dyn CpuFeatureDetector>> {
        vec![Box::new(LinuxDetector), Box::new(MacOSDetector)]
    }

    fn detect_cpu_features(features: &mut [CpuFeature]) {
        for detector in Self::cpu_features_detectors() {
            if detector.is_applicable() {
                detector.detect_features(features);
                break;
            }
        }
    }

    fn apply(features: &mut [CpuFeature]) {
        features.sort();

        let name = features
            .iter()
            .find(|cpu_feature| cpu_feature.detected)
            .map(|cpu_feature| match cpu_feature.name {
                "asimd" => "neon",
                other => other,
            })
            .unwrap_or("fallback");

        println!("cargo:rustc-env=VLASIMD_BUILD_FEATURE={name}");
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let mut features = CpuFeature::features();

    let host = env::var("HOST").unwrap_or_default();
    let target = env::var("TARGET").unwrap_or_default();

    // Probing the build host says nothing about a cross-compilation target.
    if host == target {
        PlatformDetector::detect_cpu_features(&mut features);
    }

    PlatformDetector::apply(&mut features);
}
