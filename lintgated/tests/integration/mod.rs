mod daemon_tests;
