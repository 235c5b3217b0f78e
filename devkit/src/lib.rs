/*!
# Downage DevKit - Stubs et Utilitaires pour Tests

Bibliothèque facilitant les tests du moniteur sans réseau ni disque:
- Prober scripté (serveurs up/down à la demande, journal des tentatives)
- Sink mémoire avec injection de pannes
- Harness de scénarios avec horloge synthétique
*/

pub mod mock_prober;
pub mod memory_sink;
pub mod test_utils;

pub use mock_prober::ScriptedProber;
pub use memory_sink::MemorySink;
pub use test_utils::TestHarness;
